//! iBeacon advertisement frame decoding.
//!
//! An iBeacon advertisement carries a manufacturer-specific AD structure whose
//! payload starts with the `0x02 0x15` marker, followed by:
//!
//! ```text
//! offset  size  field
//!  +4      16   proximity uuid
//! +20       2   major (big-endian)
//! +22       2   minor (big-endian)
//! +24       1   calibrated tx power (signed)
//! ```
//!
//! Offsets are relative to the start byte found by the marker search. Most
//! BLE traffic is not an iBeacon, so "no beacon" is an ordinary result and
//! not an error.

use uuid::Uuid;

use crate::types::{BeaconIdentity, BeaconObservation};

/// Two-byte iBeacon type/length marker.
pub const IBEACON_MARKER: [u8; 2] = [0x02, 0x15];

/// Bluetooth SIG company identifier for Apple, owner of the iBeacon format.
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// Manufacturer-specific data AD type.
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Start offsets probed for the marker, lowest first.
const START_OFFSETS: std::ops::RangeInclusive<usize> = 2..=5;

/// Bytes needed after the start byte to read every field.
const FRAME_LEN: usize = 25;

/// Decode a raw advertisement record into a beacon observation.
///
/// `rssi` and `address` are reported by the radio and passed through as-is.
/// Returns `None` when the record is not an iBeacon or is too short to hold
/// the fields at the matched offset. Never panics, whatever the input length.
#[must_use]
pub fn decode(payload: &[u8], rssi: i16, address: Option<&str>) -> Option<BeaconObservation> {
    let start = START_OFFSETS
        .into_iter()
        .find(|&offset| payload.get(offset + 2..offset + 4) == Some(&IBEACON_MARKER[..]))?;

    let frame = payload.get(start..start + FRAME_LEN)?;

    let uuid = Uuid::from_slice(&frame[4..20]).ok()?;
    let major = u16::from_be_bytes([frame[20], frame[21]]);
    let minor = u16::from_be_bytes([frame[22], frame[23]]);
    let tx_power = i8::from_be_bytes([frame[24]]);

    Some(BeaconObservation::new(
        BeaconIdentity::new(uuid, major, minor),
        tx_power,
        rssi,
        address.map(str::to_owned),
    ))
}

/// Build the Apple manufacturer data that advertises `identity`.
///
/// This is the payload after the company identifier: the marker, uuid,
/// major, minor and calibrated power.
#[must_use]
pub fn ibeacon_manufacturer_data(identity: &BeaconIdentity, tx_power: i8) -> [u8; 23] {
    let mut data = [0u8; 23];
    data[..2].copy_from_slice(&IBEACON_MARKER);
    data[2..18].copy_from_slice(identity.uuid.as_bytes());
    data[18..20].copy_from_slice(&identity.major.to_be_bytes());
    data[20..22].copy_from_slice(&identity.minor.to_be_bytes());
    data[22..].copy_from_slice(&tx_power.to_be_bytes());
    data
}

/// Rebuild a raw advertisement record from manufacturer-specific data.
///
/// Produces a flags AD structure followed by a manufacturer AD structure
/// (length, type `0xFF`, little-endian company id, data), which is how the
/// record looks on air. Radios that only expose parsed manufacturer data
/// use this to feed [`decode`].
///
/// Data longer than an AD structure can hold is truncated.
#[must_use]
pub fn manufacturer_scan_record(company_id: u16, data: &[u8]) -> Vec<u8> {
    // length byte covers type + company id + data and must fit in a u8
    let data = &data[..data.len().min(usize::from(u8::MAX) - 3)];
    let ad_len = u8::try_from(data.len() + 3).unwrap_or(u8::MAX);

    let mut record = Vec::with_capacity(data.len() + 7);
    record.extend_from_slice(&[0x02, 0x01, 0x06]);
    record.push(ad_len);
    record.push(AD_TYPE_MANUFACTURER_DATA);
    record.extend_from_slice(&company_id.to_le_bytes());
    record.extend_from_slice(data);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Proximity;

    const UUID: Uuid = Uuid::from_u128(0xf7826da6_4fa2_4e98_8024_bc5b71e0893e);

    fn identity() -> BeaconIdentity {
        BeaconIdentity::new(UUID, 0x1234, 0xABCD)
    }

    fn record(tx_power: i8) -> Vec<u8> {
        manufacturer_scan_record(APPLE_COMPANY_ID, &ibeacon_manufacturer_data(&identity(), tx_power))
    }

    /// Place a frame with the marker at `offset + 2`, padding before it.
    fn frame_at(offset: usize, tx_power: i8) -> Vec<u8> {
        let mut payload = vec![0u8; offset];
        payload.extend_from_slice(&[0x4C, 0x00]);
        payload.extend_from_slice(&ibeacon_manufacturer_data(&identity(), tx_power));
        payload
    }

    #[test]
    fn test_decode_standard_record() {
        let payload = record(-59);
        assert_eq!(payload.len(), 30);

        let obs = decode(&payload, -60, Some("C3:11:22:33:44:55")).unwrap();
        assert_eq!(*obs.identity(), identity());
        assert_eq!(obs.tx_power(), -59);
        assert_eq!(obs.rssi(), -60);
        assert_eq!(obs.address(), Some("C3:11:22:33:44:55"));
        assert_eq!(
            obs.identity().uuid.hyphenated().to_string(),
            "f7826da6-4fa2-4e98-8024-bc5b71e0893e"
        );
    }

    #[test]
    fn test_decode_every_start_offset() {
        for offset in 2..=5 {
            let obs = decode(&frame_at(offset, -65), -70, None)
                .unwrap_or_else(|| panic!("no beacon at offset {offset}"));
            assert_eq!(obs.identity().major, 0x1234);
            assert_eq!(obs.identity().minor, 0xABCD);
            assert_eq!(obs.tx_power(), -65);
            assert!(obs.address().is_none());
        }
    }

    #[test]
    fn test_decode_marker_outside_window_is_ignored() {
        assert!(decode(&frame_at(0, -59), -60, None).is_none());
        assert!(decode(&frame_at(1, -59), -60, None).is_none());
        assert!(decode(&frame_at(6, -59), -60, None).is_none());
    }

    #[test]
    fn test_decode_tx_power_is_sign_extended() {
        let obs = decode(&record(-128), -60, None).unwrap();
        assert_eq!(obs.tx_power(), -128);

        let obs = decode(&record(4), -60, None).unwrap();
        assert_eq!(obs.tx_power(), 4);
    }

    #[test]
    fn test_decode_derives_distance() {
        let obs = decode(&record(-59), 0, None).unwrap();
        assert_eq!(obs.proximity(), Proximity::Unknown);

        let obs = decode(&record(-59), -30, None).unwrap();
        assert_eq!(obs.proximity(), Proximity::Immediate);
    }

    #[test]
    fn test_decode_never_panics_on_short_input() {
        let full = record(-59);
        for len in 0..full.len() {
            assert!(decode(&full[..len], -60, None).is_none(), "len {len}");
        }
    }

    #[test]
    fn test_decode_truncated_frame_is_not_a_beacon() {
        // marker matched at start offset 2, frame stops early
        let mut payload = vec![0x02, 0x01, 0x06, 0x1A, 0x02, 0x15];
        payload.extend_from_slice(&[0u8; 10]);
        assert!(decode(&payload, -60, None).is_none());
    }

    /// Start-2 frame whose uuid bytes 1..3 spell the marker again, so start
    /// offset 5 matches too.
    fn doubled_marker_frame() -> (BeaconIdentity, Vec<u8>) {
        let mut uuid = [0x5Au8; 16];
        uuid[0] = 0xAA;
        uuid[1..3].copy_from_slice(&IBEACON_MARKER);
        let identity = BeaconIdentity::new(Uuid::from_bytes(uuid), 7, 8);

        let mut payload = vec![0x00, 0x00, 0x4C, 0x00];
        payload.extend_from_slice(&ibeacon_manufacturer_data(&identity, -59));
        payload.extend_from_slice(&[0x99; 8]);
        assert_eq!(&payload[4..6], &IBEACON_MARKER);
        assert_eq!(&payload[7..9], &IBEACON_MARKER);
        (identity, payload)
    }

    #[test]
    fn test_decode_lowest_offset_wins() {
        let (identity, payload) = doubled_marker_frame();

        let obs = decode(&payload, -60, None).unwrap();
        assert_eq!(*obs.identity(), identity);
        assert_eq!(obs.tx_power(), -59);
    }

    #[test]
    fn test_decode_truncated_first_match_is_not_retried() {
        let (_, payload) = doubled_marker_frame();

        // one byte short of the start-2 frame
        assert!(decode(&payload[..26], -60, None).is_none());
        assert!(decode(&payload[..27], -60, None).is_some());
    }

    #[test]
    fn test_decode_non_beacon_traffic() {
        assert!(decode(&[], -60, None).is_none());
        assert!(decode(&[0xFF; 4], -60, None).is_none());
        assert!(decode(&[0u8; 62], -60, None).is_none());
        // Eddystone-style service data, no marker
        let eddystone = [
            0x02, 0x01, 0x06, 0x03, 0x03, 0xAA, 0xFE, 0x11, 0x16, 0xAA, 0xFE, 0x10, 0x00, 0x03,
            0x67, 0x6F, 0x6F, 0x67, 0x6C, 0x65, 0x07,
        ];
        assert!(decode(&eddystone, -60, None).is_none());
    }

    #[test]
    fn test_manufacturer_scan_record_layout() {
        let record = manufacturer_scan_record(0x1234, &[0xAA, 0xBB]);
        assert_eq!(record, vec![0x02, 0x01, 0x06, 0x05, 0xFF, 0x34, 0x12, 0xAA, 0xBB]);
    }

    #[test]
    fn test_manufacturer_scan_record_truncates_oversized_data() {
        let record = manufacturer_scan_record(APPLE_COMPANY_ID, &[0u8; 300]);
        assert_eq!(record[3], u8::MAX);
        assert_eq!(record.len(), 3 + 1 + usize::from(u8::MAX));
    }
}
