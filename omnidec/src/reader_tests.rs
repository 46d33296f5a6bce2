use crate::{BinaryReader, BinaryWriter, Error};

#[test]
fn reads_fixed_width_little_endian() {
    let bytes = [
        0x01, // u8
        0xfe, // i8
        0x34, 0x12, // u16
        0x78, 0x56, 0x34, 0x12, // u32
        0xff, 0xff, 0xff, 0xff, // i32
        0x00, 0x00, 0x80, 0x3f, // f32 = 1.0
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf0, 0x3f, // f64 = 1.0
    ];
    let mut reader = BinaryReader::new(&bytes);
    assert_eq!(reader.read_u8().unwrap(), 0x01);
    assert_eq!(reader.read_i8().unwrap(), -2);
    assert_eq!(reader.read_u16().unwrap(), 0x1234);
    assert_eq!(reader.read_u32().unwrap(), 0x12345678);
    assert_eq!(reader.read_i32().unwrap(), -1);
    assert_eq!(reader.read_f32().unwrap(), 1.0);
    assert_eq!(reader.read_f64().unwrap(), 1.0);
    assert_eq!(reader.remaining(), 0);
}

#[test]
fn read_string_stops_at_nul() {
    let bytes = b"hello\0world\0";
    let mut reader = BinaryReader::new(bytes);
    assert_eq!(reader.read_string().unwrap(), "hello");
    assert_eq!(reader.read_string().unwrap(), "world");
    assert_eq!(reader.position(), bytes.len());
}

#[test]
fn read_bytes_returns_a_view_and_advances() {
    let bytes = [1u8, 2, 3, 4, 5];
    let mut reader = BinaryReader::new(&bytes);
    assert_eq!(reader.read_bytes(3).unwrap(), &[1, 2, 3]);
    assert_eq!(reader.position(), 3);
}

#[test]
fn out_of_bounds_carries_offset_and_buffer_length() {
    let bytes = [0u8; 4];
    let mut reader = BinaryReader::new(&bytes);
    reader.skip(2).unwrap();
    match reader.read_u32() {
        Err(Error::OutOfBounds {
            offset,
            len,
            buffer_len,
        }) => {
            assert_eq!(offset, 2);
            assert_eq!(len, 4);
            assert_eq!(buffer_len, 4);
        }
        other => panic!("expected OutOfBounds, got {other:?}"),
    }
    // A failed read must not move the cursor.
    assert_eq!(reader.position(), 2);
}

#[test]
fn seek_past_end_fails_but_seek_to_end_is_allowed() {
    let bytes = [0u8; 8];
    let mut reader = BinaryReader::new(&bytes);
    reader.seek(8).unwrap();
    assert!(reader.seek(9).is_err());
    assert_eq!(reader.position(), 8);
}

#[test]
fn writer_round_trips_through_reader() {
    let mut writer = BinaryWriter::new();
    writer.write_u8(0xab);
    writer.write_u16(0x1234);
    writer.write_u32(0xdead_beef);
    writer.write_i32(-7);
    writer.write_f32(0.5);
    writer.write_f64(-2.25);
    writer.write_cstr("omni");

    let bytes = writer.into_vec();
    let mut reader = BinaryReader::new(&bytes);
    assert_eq!(reader.read_u8().unwrap(), 0xab);
    assert_eq!(reader.read_u16().unwrap(), 0x1234);
    assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
    assert_eq!(reader.read_i32().unwrap(), -7);
    assert_eq!(reader.read_f32().unwrap(), 0.5);
    assert_eq!(reader.read_f64().unwrap(), -2.25);
    assert_eq!(reader.read_string().unwrap(), "omni");
    assert_eq!(reader.remaining(), 0);
}

#[test]
fn writer_materializes_exact_length() {
    let mut writer = BinaryWriter::new();
    writer.write_bytes(&[1, 2, 3]);
    assert_eq!(writer.len(), 3);
    assert_eq!(writer.as_slice(), &[1, 2, 3]);
    writer.clear();
    assert!(writer.is_empty());
    writer.write_str("ab");
    assert_eq!(writer.into_vec(), b"ab");
}
