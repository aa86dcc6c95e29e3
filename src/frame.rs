//! Typed frame observations and the field normaliser.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;
use crate::parser::{self, RadioHeader, RawFrame, WlanHeader};
use crate::phy;

/// A 48-bit IEEE MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&parser::format_mac(&self.0))
    }
}

impl FromStr for MacAddr {
    type Err = String;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(format!("invalid MAC address {s:?}"));
        }
        let mut mac = [0u8; 6];
        for (byte, part) in mac.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(format!("invalid MAC address {s:?}"));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| format!("invalid MAC address {s:?}"))?;
        }
        Ok(MacAddr(mac))
    }
}

/// One processed 802.11 frame.  Optional fields are `None` when the frame did
/// not carry them; a present zero is kept distinct from absence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameObservation {
    pub bssid: Option<MacAddr>,
    pub transmitter_addr: Option<MacAddr>,
    pub receiver_addr: Option<MacAddr>,
    /// `(type << 4) | subtype`, e.g. 0x08 beacon, 0x28 QoS data.
    pub type_subtype: u16,
    pub retry: bool,
    pub phy: Option<u8>,
    pub data_rate_mbps: Option<f64>,
    pub channel: Option<u16>,
    pub frequency_mhz: Option<u16>,
    pub signal_dbm: Option<i8>,
    /// 0..=3 for 20/40/80/160 MHz.
    pub bandwidth_code: Option<u8>,
    pub short_gi: Option<bool>,
    pub mcs_index: Option<u8>,
    pub ssid: Option<String>,
    pub spatial_streams: u8,
    pub phy_gap: Option<i32>,
}

impl FrameObservation {
    /// Data frames are the ones carrying a modulation index.
    pub fn is_data(&self) -> bool {
        self.mcs_index.is_some()
    }

    /// Data rate with absence treated as 0 Mbps.
    pub fn data_rate_or_zero(&self) -> f64 {
        self.data_rate_mbps.unwrap_or(0.0)
    }
}

/// Convert a decoded record into a [`FrameObservation`].
///
/// Fails with [`FrameError::NotAWirelessFrame`] when the record lacks either
/// the 802.11 or the radio sublayer.
pub fn normalize(raw: &RawFrame) -> Result<FrameObservation, FrameError> {
    let (Some(wlan), Some(radio)) = (&raw.wlan, &raw.radio) else {
        return Err(FrameError::NotAWirelessFrame);
    };
    Ok(build_observation(wlan, radio))
}

fn build_observation(wlan: &WlanHeader, radio: &RadioHeader) -> FrameObservation {
    let ht = radio.mcs;
    let mcs_index = ht.and_then(|m| m.index());
    let bandwidth_code = ht.and_then(|m| m.bandwidth()).map(ht_bandwidth_code);
    let short_gi = ht.and_then(|m| m.short_gi());

    let data_rate_mbps = match (radio.rate, mcs_index, bandwidth_code) {
        (Some(rate), _, _) if rate > 0 => Some(f64::from(rate) / 2.0),
        (_, Some(mcs), Some(bw)) => phy::ht_data_rate(mcs, bw, short_gi.unwrap_or(false)),
        _ => None,
    };

    let spatial_streams = phy::spatial_streams(mcs_index);
    let phy_gap = phy::phy_gap(radio.signal_dbm, bandwidth_code, mcs_index, spatial_streams);

    FrameObservation {
        bssid: wlan.bssid.map(MacAddr),
        transmitter_addr: wlan.transmitter.map(MacAddr),
        receiver_addr: wlan.receiver.map(MacAddr),
        type_subtype: (u16::from(wlan.frame_type) << 4) | u16::from(wlan.subtype),
        retry: wlan.retry,
        phy: phy_number(radio),
        data_rate_mbps,
        channel: radio.channel_freq.and_then(frequency_to_channel),
        frequency_mhz: radio.channel_freq.filter(|&f| f > 0),
        signal_dbm: radio.signal_dbm,
        bandwidth_code,
        short_gi,
        mcs_index,
        ssid: wlan.ssid.clone().filter(|s| !s.is_empty()),
        spatial_streams,
        phy_gap,
    }
}

/// HT bandwidth bits: 20 MHz, 40 MHz, then the 20L/20U halves of a 40 MHz
/// channel, which are 20 MHz transmissions.
fn ht_bandwidth_code(bits: u8) -> u8 {
    match bits {
        1 => 1,
        _ => 0,
    }
}

fn phy_number(radio: &RadioHeader) -> Option<u8> {
    if radio.mcs.is_some() {
        return Some(phy::PHY_11N);
    }
    let flags = radio.channel_flags?;
    if flags & parser::CHAN_OFDM != 0 && flags & parser::CHAN_5GHZ != 0 {
        Some(phy::PHY_11A)
    } else if flags & (parser::CHAN_OFDM | parser::CHAN_DYN) != 0 {
        Some(phy::PHY_11G)
    } else if flags & parser::CHAN_CCK != 0 {
        Some(phy::PHY_11B)
    } else {
        None
    }
}

/// Channel number for a centre frequency in MHz.
pub fn frequency_to_channel(freq: u16) -> Option<u16> {
    match freq {
        2484 => Some(14),
        2412..=2472 => Some((freq - 2407) / 5),
        5000..=5900 => Some((freq - 5000) / 5),
        5955..=7115 => Some((freq - 5950) / 5),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::{beacon, data_frame, radiotap, AP, STA};
    use crate::parser::{parse_frame, HtMcs, CHAN_2GHZ, CHAN_5GHZ, CHAN_CCK, CHAN_OFDM, DLT_IEEE802_11, DLT_IEEE802_11_RADIO};

    #[test]
    fn test_mac_parse_and_display() {
        let mac: MacAddr = "10:7C:61:DF:7A:D2".parse().unwrap();
        assert_eq!(mac, MacAddr(AP));
        assert_eq!(mac.to_string(), "10:7c:61:df:7a:d2");
        assert_eq!("10-7c-61-df-7a-d2".parse::<MacAddr>().unwrap(), mac);
        assert!("10:7c:61".parse::<MacAddr>().is_err());
        assert!("zz:7c:61:df:7a:d2".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_frequency_to_channel() {
        assert_eq!(frequency_to_channel(2412), Some(1));
        assert_eq!(frequency_to_channel(2437), Some(6));
        assert_eq!(frequency_to_channel(2484), Some(14));
        assert_eq!(frequency_to_channel(5180), Some(36));
        assert_eq!(frequency_to_channel(0), None);
    }

    #[test]
    fn test_normalize_ht_data_frame() {
        let mcs = HtMcs { known: 0x07, flags: 0x05, index: 7 };
        let mut pkt = radiotap(0, 0, 5180, CHAN_OFDM | CHAN_5GHZ, -61, Some(mcs));
        pkt.extend_from_slice(&data_frame(false));
        let obs = normalize(&parse_frame(&pkt, DLT_IEEE802_11_RADIO).unwrap()).unwrap();

        assert_eq!(obs.bssid, Some(MacAddr(AP)));
        assert_eq!(obs.transmitter_addr, Some(MacAddr(AP)));
        assert_eq!(obs.receiver_addr, Some(MacAddr(STA)));
        assert_eq!(obs.type_subtype, 0x28);
        assert_eq!(obs.phy, Some(phy::PHY_11N));
        assert_eq!(obs.channel, Some(36));
        assert_eq!(obs.bandwidth_code, Some(1));
        assert_eq!(obs.short_gi, Some(true));
        assert_eq!(obs.mcs_index, Some(7));
        assert_eq!(obs.spatial_streams, 1);
        assert!(obs.is_data());
        // A zero legacy rate defers to the HT table: 135 Mbps with short GI.
        let rate = obs.data_rate_mbps.unwrap();
        assert!((rate - 150.0).abs() < 1e-9);
        // -61 dBm on 40 MHz reaches breakpoint 7.
        assert_eq!(obs.phy_gap, Some(0));
    }

    #[test]
    fn test_normalize_ht_rate_from_table() {
        let mcs = HtMcs { known: 0x07, flags: 0x00, index: 3 };
        let mut rt = vec![0u8, 0, 0, 0];
        let present: u32 = (1 << 5) | (1 << 19);
        rt.extend_from_slice(&present.to_le_bytes());
        rt.push((-55i8) as u8);
        rt.extend_from_slice(&[mcs.known, mcs.flags, mcs.index]);
        let len = rt.len() as u16;
        rt[2..4].copy_from_slice(&len.to_le_bytes());
        rt.extend_from_slice(&data_frame(false));

        let obs = normalize(&parse_frame(&rt, DLT_IEEE802_11_RADIO).unwrap()).unwrap();
        assert_eq!(obs.data_rate_mbps, Some(26.0));
        assert_eq!(obs.frequency_mhz, None);
        assert_eq!(obs.channel, None);
    }

    #[test]
    fn test_normalize_legacy_beacon() {
        let mut pkt = radiotap(0, 2, 2412, CHAN_CCK | CHAN_2GHZ, -70, None);
        pkt.extend_from_slice(&beacon("HomeNet"));
        let obs = normalize(&parse_frame(&pkt, DLT_IEEE802_11_RADIO).unwrap()).unwrap();
        assert_eq!(obs.type_subtype, 0x08);
        assert_eq!(obs.phy, Some(phy::PHY_11B));
        assert_eq!(obs.data_rate_mbps, Some(1.0));
        assert_eq!(obs.channel, Some(1));
        assert_eq!(obs.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(obs.mcs_index, None);
        assert_eq!(obs.spatial_streams, 0);
        assert_eq!(obs.phy_gap, None);
        assert!(!obs.is_data());
    }

    #[test]
    fn test_hidden_ssid_is_absent() {
        let mut pkt = radiotap(0, 12, 2437, CHAN_OFDM | CHAN_2GHZ, -40, None);
        pkt.extend_from_slice(&beacon(""));
        let obs = normalize(&parse_frame(&pkt, DLT_IEEE802_11_RADIO).unwrap()).unwrap();
        assert_eq!(obs.ssid, None);
        assert_eq!(obs.phy, Some(phy::PHY_11G));
    }

    #[test]
    fn test_missing_radio_layer() {
        let raw = parse_frame(&data_frame(false), DLT_IEEE802_11).unwrap();
        assert_eq!(normalize(&raw), Err(FrameError::NotAWirelessFrame));
    }

    #[test]
    fn test_missing_wlan_layer() {
        let pkt = radiotap(0, 2, 2412, CHAN_CCK, -70, None);
        let raw = parse_frame(&pkt, DLT_IEEE802_11_RADIO).unwrap();
        assert_eq!(normalize(&raw), Err(FrameError::NotAWirelessFrame));
    }
}
