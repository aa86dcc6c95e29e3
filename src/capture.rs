//! Capture-file frame source.
//!
//! Opens a pcap/pcapng file with libpcap and yields one decoded record per
//! packet.  Only 802.11 datalinks are accepted.

use std::path::{Path, PathBuf};

use pcap::{Capture, Offline};

use crate::error::{FrameError, SourceError};
use crate::parser::{self, RawFrame, DLT_IEEE802_11, DLT_IEEE802_11_RADIO};

/// A forward-only stream of decoded capture records.
pub trait FrameSource {
    /// Next record, `None` at end of stream.  A per-record error does not end
    /// the stream.
    fn next_frame(&mut self) -> Option<Result<RawFrame, FrameError>>;

    /// Release the underlying resources.  Idempotent; after closing,
    /// `next_frame` returns `None`.
    fn close(&mut self);
}

/// [`FrameSource`] over a capture file.
pub struct PcapFileSource {
    path: PathBuf,
    capture: Option<Capture<Offline>>,
    dlt: i32,
}

impl PcapFileSource {
    /// Open a capture file and check its datalink type.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let capture = Capture::from_file(path).map_err(|source| SourceError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let dlt = capture.get_datalink().0;
        log::info!(
            "Opened {}, datalink {} ({})",
            path.display(),
            dlt,
            dlt_name(dlt)
        );

        if dlt != DLT_IEEE802_11_RADIO && dlt != DLT_IEEE802_11 {
            return Err(SourceError::UnsupportedDatalink {
                dlt,
                name: dlt_name(dlt),
            });
        }
        if dlt == DLT_IEEE802_11 {
            log::warn!(
                "Capture has no Radiotap headers; frames lack radio information and will be skipped."
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            capture: Some(capture),
            dlt,
        })
    }
}

impl FrameSource for PcapFileSource {
    fn next_frame(&mut self) -> Option<Result<RawFrame, FrameError>> {
        let capture = self.capture.as_mut()?;
        match capture.next_packet() {
            Ok(packet) => return Some(parser::parse_frame(packet.data, self.dlt)),
            Err(pcap::Error::NoMorePackets) => {
                log::debug!("End of capture {}", self.path.display());
            }
            Err(e) => {
                log::error!("Read error in {}, ending stream: {e}", self.path.display());
            }
        }
        self.close();
        None
    }

    fn close(&mut self) {
        if self.capture.take().is_some() {
            log::debug!("Closed {}", self.path.display());
        }
    }
}

/// Human-readable name for common DLT values.
pub fn dlt_name(dlt: i32) -> &'static str {
    match dlt {
        0 => "NULL/Loopback",
        1 => "Ethernet (EN10MB)",
        6 => "IEEE 802.5 Token Ring",
        9 => "PPP",
        12 => "Raw IP",
        105 => "IEEE 802.11 (raw)",
        127 => "IEEE 802.11 Radiotap",
        119 => "IEEE 802.11 PrismHeader",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Classic pcap file with the given link type and packets.
    fn write_pcap(linktype: u32, packets: &[Vec<u8>]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut hdr = Vec::new();
        hdr.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        hdr.extend_from_slice(&2u16.to_le_bytes());
        hdr.extend_from_slice(&4u16.to_le_bytes());
        hdr.extend_from_slice(&0i32.to_le_bytes());
        hdr.extend_from_slice(&0u32.to_le_bytes());
        hdr.extend_from_slice(&65535u32.to_le_bytes());
        hdr.extend_from_slice(&linktype.to_le_bytes());
        file.write_all(&hdr).unwrap();
        for (i, pkt) in packets.iter().enumerate() {
            let mut rec = Vec::new();
            rec.extend_from_slice(&(i as u32).to_le_bytes());
            rec.extend_from_slice(&0u32.to_le_bytes());
            rec.extend_from_slice(&(pkt.len() as u32).to_le_bytes());
            rec.extend_from_slice(&(pkt.len() as u32).to_le_bytes());
            file.write_all(&rec).unwrap();
            file.write_all(pkt).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_dlt_name() {
        assert_eq!(dlt_name(127), "IEEE 802.11 Radiotap");
        assert_eq!(dlt_name(9999), "Unknown");
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = PcapFileSource::open(Path::new("/nonexistent/capture.pcap")).err().unwrap();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[test]
    fn test_ethernet_capture_rejected() {
        let file = write_pcap(1, &[]);
        let err = PcapFileSource::open(file.path()).err().unwrap();
        assert!(matches!(err, SourceError::UnsupportedDatalink { dlt: 1, .. }));
    }

    #[test]
    fn test_reads_frames_then_ends() {
        use crate::parser::tests::{beacon, data_frame, radiotap};
        use crate::parser::{CHAN_2GHZ, CHAN_CCK};

        let mut good = radiotap(0, 2, 2412, CHAN_CCK | CHAN_2GHZ, -70, None);
        good.extend_from_slice(&beacon("HomeNet"));
        let truncated = vec![0u8, 0, 8];
        let mut data = radiotap(0, 108, 2412, CHAN_CCK | CHAN_2GHZ, -50, None);
        data.extend_from_slice(&data_frame(false));
        let file = write_pcap(127, &[good, truncated, data]);

        let mut source = PcapFileSource::open(file.path()).unwrap();
        assert!(source.next_frame().unwrap().is_ok());
        assert!(matches!(source.next_frame(), Some(Err(FrameError::Decode(_)))));
        assert!(source.next_frame().unwrap().is_ok());
        assert!(source.next_frame().is_none());
        assert!(source.next_frame().is_none());
        source.close();
        source.close();
    }

    #[test]
    fn test_close_before_read() {
        let file = write_pcap(127, &[vec![0u8; 4]]);
        let mut source = PcapFileSource::open(file.path()).unwrap();
        source.close();
        assert!(source.next_frame().is_none());
    }
}
