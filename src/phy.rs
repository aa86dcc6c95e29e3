//! Spatial-stream and PHY-gap calculations for 802.11n (HT) links.
//!
//! The PHY gap compares the MCS index a link *should* reach for its observed
//! RSSI with the MCS index it actually uses.  A positive gap means the link is
//! leaving capacity on the table.

/// PHY numbering used in decoded frames (same values as common analysers).
pub const PHY_11B: u8 = 4;
pub const PHY_11A: u8 = 5;
pub const PHY_11G: u8 = 6;
pub const PHY_11N: u8 = 7;

/// Gap reported when a data frame carries no signal reading.
pub const NO_SIGNAL_GAP: i32 = 4;

/// Channel width in MHz for each bandwidth code.
const CHANNEL_WIDTH_MHZ: [u32; 4] = [20, 40, 80, 160];

/// Minimum RSSI (dBm) needed for MCS 0..=7 of a single spatial stream,
/// one row per bandwidth code.
const EXPECTED_MCS_RSSI: [[i32; 8]; 4] = [
    [-82, -79, -77, -74, -70, -66, -65, -64], // 20 MHz
    [-79, -76, -74, -71, -67, -63, -62, -61], // 40 MHz
    [-76, -73, -71, -68, -64, -60, -59, -58], // 80 MHz
    [-73, -70, -68, -65, -61, -57, -56, -55], // 160 MHz
];

/// HT data rates (Mbps) for one spatial stream, long guard interval.
const HT_RATE_20MHZ: [f64; 8] = [6.5, 13.0, 19.5, 26.0, 39.0, 52.0, 58.5, 65.0];
const HT_RATE_40MHZ: [f64; 8] = [13.5, 27.0, 40.5, 54.0, 81.0, 108.0, 121.5, 135.0];

/// Highest HT MCS index (four spatial streams).
const HT_MAX_MCS: u8 = 31;

/// Channel width in MHz for a bandwidth code, `None` for unknown codes.
pub fn channel_width_mhz(bandwidth_code: u8) -> Option<u32> {
    CHANNEL_WIDTH_MHZ.get(bandwidth_code as usize).copied()
}

/// Number of spatial streams encoded in an HT MCS index.
///
/// MCS 0–7 use one stream, 8–15 two, and so on.  Returns 0 when the frame
/// has no MCS index.
pub fn spatial_streams(mcs_index: Option<u8>) -> u8 {
    match mcs_index {
        Some(mcs) => mcs / 8 + 1,
        None => 0,
    }
}

/// Difference between the RSSI-expected MCS index and the MCS index in use.
///
/// Returns `None` without a bandwidth code or MCS index, and
/// [`NO_SIGNAL_GAP`] when the RSSI is missing.  An RSSI below every
/// breakpoint expects MCS 0 of the stream group.
pub fn phy_gap(
    rssi: Option<i8>,
    bandwidth_code: Option<u8>,
    mcs_index: Option<u8>,
    spatial_streams: u8,
) -> Option<i32> {
    let bandwidth_code = bandwidth_code?;
    let mcs_index = mcs_index?;
    let Some(rssi) = rssi else {
        return Some(NO_SIGNAL_GAP);
    };
    let breakpoints = EXPECTED_MCS_RSSI.get(bandwidth_code as usize)?;

    let rssi = i32::from(rssi);
    let mut expected = 0;
    for (i, &threshold) in breakpoints.iter().enumerate() {
        if rssi >= threshold {
            expected = i as i32;
        } else {
            break;
        }
    }

    let stream_offset = 8 * (i32::from(spatial_streams) - 1);
    Some(expected + stream_offset - i32::from(mcs_index))
}

/// Nominal HT data rate in Mbps for an MCS index, bandwidth code and guard
/// interval.
///
/// Only 20 and 40 MHz exist for HT; other codes and MCS indices above 31
/// yield `None`.
pub fn ht_data_rate(mcs_index: u8, bandwidth_code: u8, short_gi: bool) -> Option<f64> {
    if mcs_index > HT_MAX_MCS {
        return None;
    }
    let table = match bandwidth_code {
        0 => &HT_RATE_20MHZ,
        1 => &HT_RATE_40MHZ,
        _ => return None,
    };
    let streams = f64::from(spatial_streams(Some(mcs_index)));
    let rate = table[(mcs_index % 8) as usize] * streams;
    Some(if short_gi { rate * 10.0 / 9.0 } else { rate })
}
