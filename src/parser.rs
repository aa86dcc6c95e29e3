//! 802.11 frame and Radiotap header parsing.
//!
//! Splits a raw pcap record into its radio sublayer (Radiotap) and its
//! 802.11 MAC header.  Fields are kept close to their on-air encoding here;
//! turning them into typed, defaulted values is the job of
//! [`crate::frame::normalize`].

use crate::error::FrameError;

/// pcap datalink: Radiotap + 802.11.
pub const DLT_IEEE802_11_RADIO: i32 = 127;
/// pcap datalink: raw 802.11 without a radio header.
pub const DLT_IEEE802_11: i32 = 105;

/// A decoded capture record.  Either sublayer may be missing.
#[derive(Debug, Clone, Default)]
pub struct RawFrame {
    pub wlan: Option<WlanHeader>,
    pub radio: Option<RadioHeader>,
}

/// Fields of the 802.11 MAC header (plus the SSID element of management
/// frames).
#[derive(Debug, Clone, Default)]
pub struct WlanHeader {
    pub frame_type: u8,
    pub subtype: u8,
    pub retry: bool,
    /// Address 1.
    pub receiver: Option<[u8; 6]>,
    /// Address 2, when the frame type carries one.
    pub transmitter: Option<[u8; 6]>,
    pub bssid: Option<[u8; 6]>,
    pub ssid: Option<String>,
}

/// Fields of the Radiotap header.
#[derive(Debug, Clone, Default)]
pub struct RadioHeader {
    pub flags: Option<u8>,
    /// Legacy rate in 500 kbps units.
    pub rate: Option<u8>,
    pub channel_freq: Option<u16>,
    pub channel_flags: Option<u16>,
    pub signal_dbm: Option<i8>,
    pub mcs: Option<HtMcs>,
}

/// The Radiotap MCS field (802.11n).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtMcs {
    pub known: u8,
    pub flags: u8,
    pub index: u8,
}

impl HtMcs {
    pub const KNOWN_BANDWIDTH: u8 = 0x01;
    pub const KNOWN_MCS: u8 = 0x02;
    pub const KNOWN_GI: u8 = 0x04;

    const FLAG_BANDWIDTH_MASK: u8 = 0x03;
    const FLAG_SHORT_GI: u8 = 0x04;

    /// Raw bandwidth bits (0 = 20, 1 = 40, 2 = 20L, 3 = 20U), if known.
    pub fn bandwidth(&self) -> Option<u8> {
        (self.known & Self::KNOWN_BANDWIDTH != 0).then_some(self.flags & Self::FLAG_BANDWIDTH_MASK)
    }

    /// Short guard interval flag, if known.
    pub fn short_gi(&self) -> Option<bool> {
        (self.known & Self::KNOWN_GI != 0).then_some(self.flags & Self::FLAG_SHORT_GI != 0)
    }

    /// MCS index, if known.
    pub fn index(&self) -> Option<u8> {
        (self.known & Self::KNOWN_MCS != 0).then_some(self.index)
    }
}

// ---------------------------------------------------------------------------
// Radiotap header parsing
// ---------------------------------------------------------------------------

/// Radiotap flags: frame includes a trailing FCS.
pub const RADIOTAP_F_FCS: u8 = 0x10;
/// Radiotap flags: frame failed its FCS check.
pub const RADIOTAP_F_BAD_FCS: u8 = 0x40;

/// Radiotap channel flags.
pub const CHAN_CCK: u16 = 0x0020;
pub const CHAN_OFDM: u16 = 0x0040;
pub const CHAN_2GHZ: u16 = 0x0080;
pub const CHAN_5GHZ: u16 = 0x0100;
pub const CHAN_DYN: u16 = 0x0400;

/// Field metadata: (bit index, size in bytes, alignment).
const RADIOTAP_FIELDS: &[(u8, usize, usize)] = &[
    (0, 8, 8),   // TSFT
    (1, 1, 1),   // Flags
    (2, 1, 1),   // Rate
    (3, 4, 2),   // Channel (freq u16 + flags u16)
    (4, 2, 1),   // FHSS
    (5, 1, 1),   // Antenna Signal dBm
    (6, 1, 1),   // Antenna Noise dBm
    (7, 2, 2),   // Lock Quality
    (8, 2, 2),   // TX Attenuation
    (9, 2, 2),   // dB TX Attenuation
    (10, 1, 1),  // dBm TX Power
    (11, 1, 1),  // Antenna index
    (12, 1, 1),  // dB Antenna Signal
    (13, 1, 1),  // dB Antenna Noise
    (14, 2, 2),  // RX Flags
    (15, 2, 2),  // TX Flags
    (16, 1, 1),  // RTS retries
    (17, 1, 1),  // Data retries
    (18, 8, 4),  // XChannel
    (19, 3, 1),  // MCS (known, flags, index)
    (20, 8, 4),  // A-MPDU status
    (21, 12, 2), // VHT
];

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Parse the Radiotap header.  Returns the header and the offset where the
/// 802.11 frame begins.
fn parse_radiotap(data: &[u8]) -> Result<(RadioHeader, usize), FrameError> {
    if data.len() < 8 {
        return Err(FrameError::Decode("truncated radiotap header".into()));
    }
    let version = data[0];
    if version != 0 {
        return Err(FrameError::Decode(format!(
            "unsupported radiotap version {version}"
        )));
    }
    let header_len = u16::from_le_bytes([data[2], data[3]]) as usize;
    if header_len < 8 {
        return Err(FrameError::Decode(format!("invalid radiotap length {header_len}")));
    }
    if data.len() < header_len {
        return Err(FrameError::Decode(format!(
            "radiotap length {header_len} exceeds captured {} bytes",
            data.len()
        )));
    }
    let present = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    // Skip any extended present bitmasks (bit 31 set).
    let mut bitmask_count = 1usize;
    {
        let mut p = present;
        while p & (1 << 31) != 0 {
            let base = 4 + bitmask_count * 4;
            if header_len < base + 4 {
                return Err(FrameError::Decode("truncated radiotap bitmask".into()));
            }
            p = u32::from_le_bytes([data[base], data[base + 1], data[base + 2], data[base + 3]]);
            bitmask_count += 1;
        }
    }

    let mut offset = 4 + bitmask_count * 4;
    let mut radio = RadioHeader::default();

    for &(bit, size, align) in RADIOTAP_FIELDS {
        if present & (1 << bit) == 0 {
            continue;
        }
        offset = align_up(offset, align);
        if offset + size > header_len {
            break;
        }
        let field = &data[offset..offset + size];
        match bit {
            1 => radio.flags = Some(field[0]),
            2 => radio.rate = Some(field[0]),
            3 => {
                radio.channel_freq = Some(u16::from_le_bytes([field[0], field[1]]));
                radio.channel_flags = Some(u16::from_le_bytes([field[2], field[3]]));
            }
            5 => radio.signal_dbm = Some(field[0] as i8),
            19 => {
                radio.mcs = Some(HtMcs {
                    known: field[0],
                    flags: field[1],
                    index: field[2],
                })
            }
            _ => {}
        }
        offset += size;
    }

    Ok((radio, header_len))
}

// ---------------------------------------------------------------------------
// 802.11 MAC header parsing
// ---------------------------------------------------------------------------

pub const IEEE80211_FC_TYPE_MGMT: u8 = 0;
pub const IEEE80211_FC_TYPE_CTRL: u8 = 1;
pub const IEEE80211_FC_TYPE_DATA: u8 = 2;

const FC_TO_DS: u8 = 0x01;
const FC_FROM_DS: u8 = 0x02;
const FC_RETRY: u8 = 0x08;

const CTRL_SUBTYPE_CTS: u8 = 12;
const CTRL_SUBTYPE_ACK: u8 = 13;

/// FC + Duration + Addr1.
const MIN_HEADER_LEN: usize = 10;
/// FC + Dur + Addr1 + Addr2 + Addr3 + SeqCtl.
const MGMT_HEADER_LEN: usize = 24;

const FCS_LEN: usize = 4;

fn mac_at(data: &[u8], offset: usize) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[offset..offset + 6]);
    mac
}

/// Parse an 802.11 MAC header.  `data` must already exclude any FCS.
fn parse_wlan(data: &[u8]) -> Result<WlanHeader, FrameError> {
    if data.len() < MIN_HEADER_LEN {
        return Err(FrameError::Decode(format!(
            "802.11 header truncated at {} bytes",
            data.len()
        )));
    }

    let fc0 = data[0];
    let fc1 = data[1];
    let frame_type = (fc0 >> 2) & 0x03;
    let subtype = (fc0 >> 4) & 0x0F;

    let mut hdr = WlanHeader {
        frame_type,
        subtype,
        retry: fc1 & FC_RETRY != 0,
        receiver: Some(mac_at(data, 4)),
        ..Default::default()
    };

    match frame_type {
        IEEE80211_FC_TYPE_MGMT | IEEE80211_FC_TYPE_DATA => {
            if data.len() < MGMT_HEADER_LEN {
                return Err(FrameError::Decode(format!(
                    "802.11 header truncated at {} bytes",
                    data.len()
                )));
            }
            hdr.transmitter = Some(mac_at(data, 10));
            let addr3 = mac_at(data, 16);
            hdr.bssid = if frame_type == IEEE80211_FC_TYPE_MGMT {
                Some(addr3)
            } else {
                match fc1 & (FC_TO_DS | FC_FROM_DS) {
                    0 => Some(addr3),
                    FC_TO_DS => hdr.receiver,
                    FC_FROM_DS => hdr.transmitter,
                    _ => None, // WDS: four addresses, no single BSSID
                }
            };
            if frame_type == IEEE80211_FC_TYPE_MGMT {
                hdr.ssid = mgmt_fixed_len(subtype)
                    .and_then(|fixed| data.get(MGMT_HEADER_LEN + fixed..))
                    .and_then(parse_ssid_tag);
            }
        }
        IEEE80211_FC_TYPE_CTRL => {
            if subtype != CTRL_SUBTYPE_CTS && subtype != CTRL_SUBTYPE_ACK && data.len() >= 16 {
                hdr.transmitter = Some(mac_at(data, 10));
            }
        }
        _ => {}
    }

    Ok(hdr)
}

/// Length of the fixed parameters preceding the tagged parameters of a
/// management frame, for the subtypes that carry an SSID element.
fn mgmt_fixed_len(subtype: u8) -> Option<usize> {
    match subtype {
        0 => Some(4),      // association request
        2 => Some(10),     // reassociation request
        4 => Some(0),      // probe request
        5 | 8 => Some(12), // probe response, beacon
        _ => None,
    }
}

/// Walk the tagged parameters and extract the SSID (tag 0).
fn parse_ssid_tag(body: &[u8]) -> Option<String> {
    let mut offset = 0;
    while offset + 2 <= body.len() {
        let tag = body[offset];
        let len = body[offset + 1] as usize;
        offset += 2;
        if offset + len > body.len() {
            break;
        }
        if tag == 0 {
            return Some(String::from_utf8_lossy(&body[offset..offset + len]).into_owned());
        }
        offset += len;
    }
    None
}

/// Decode a raw pcap record.
///
/// `dlt` is the pcap datalink type:
/// - 127 = DLT_IEEE802_11_RADIO (Radiotap + 802.11)
/// - 105 = DLT_IEEE802_11       (raw 802.11, no radio sublayer)
pub fn parse_frame(data: &[u8], dlt: i32) -> Result<RawFrame, FrameError> {
    let (radio, dot11) = match dlt {
        DLT_IEEE802_11_RADIO => {
            let (radio, header_len) = parse_radiotap(data)?;
            (Some(radio), &data[header_len..])
        }
        DLT_IEEE802_11 => (None, data),
        _ => return Err(FrameError::NotAWirelessFrame),
    };

    let flags = radio.as_ref().and_then(|r| r.flags).unwrap_or(0);
    if flags & RADIOTAP_F_BAD_FCS != 0 {
        return Err(FrameError::Decode("bad FCS".into()));
    }
    let dot11 = if flags & RADIOTAP_F_FCS != 0 {
        &dot11[..dot11.len().saturating_sub(FCS_LEN)]
    } else {
        dot11
    };

    let wlan = if dot11.is_empty() {
        None
    } else {
        Some(parse_wlan(dot11)?)
    };

    Ok(RawFrame { wlan, radio })
}

/// Format a MAC address as a colon-separated lowercase hex string.
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
