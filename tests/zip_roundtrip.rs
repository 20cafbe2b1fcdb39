use std::io::{Cursor, Read, Write};

use rzipc::entry::CompressionMethod;
use rzipc::{Error, GzipInputBuf, GzipOutputBuf, MatchMode, ZipArchive, ZipWriter};

fn write_archive(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let _ = env_logger::try_init();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes, method) in entries {
        match method {
            CompressionMethod::Stored => writer.start_stored_entry(name).unwrap(),
            CompressionMethod::Deflated => writer.start_entry(name).unwrap(),
            CompressionMethod::Unsupported(_) => panic!("can't write an unsupported method"),
        }
        writer.write_data(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn round_trips_a_mix_of_stored_and_deflated_entries_in_order() {
    let entries: Vec<(&str, &[u8], CompressionMethod)> = vec![
        ("first.txt", b"hello, world".as_slice(), CompressionMethod::Stored),
        ("second.bin", b"some more bytes to compress".as_slice(), CompressionMethod::Deflated),
        ("third.txt", b"".as_slice(), CompressionMethod::Deflated),
    ];
    let bytes = write_archive(&entries);

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 3);

    let names: Vec<&str> = archive.entries().iter().map(|e| e.filename()).collect();
    assert_eq!(names, vec!["first.txt", "second.bin", "third.txt"]);

    for (name, expected, _) in &entries {
        let mut out = Vec::new();
        archive
            .get_input_stream(name, MatchMode::Ignore)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(&out, expected, "mismatch for {name}");
    }
}

#[test]
fn stored_entries_round_trip_byte_identically_with_no_expansion() {
    let data = b"no compression should touch these bytes".to_vec();
    let bytes = write_archive(&[("raw.bin", &data, CompressionMethod::Stored)]);

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let central = archive.get_entry("raw.bin", MatchMode::Ignore).unwrap();
    assert_eq!(central.local.compressed_size as usize, data.len());
    assert_eq!(central.local.uncompressed_size as usize, data.len());

    let mut out = Vec::new();
    archive
        .get_input_stream("raw.bin", MatchMode::Ignore)
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, data);
}

#[test]
fn crc_mismatch_is_detected_on_final_read() {
    let bytes = write_archive(&[("a.txt", b"hello", CompressionMethod::Stored)]);
    let mut bytes = bytes;
    // Flip a byte inside the stored payload ("hello" starts right after the
    // 30-byte local header for a one-char filename with no extra field).
    let payload_offset = 30 + "a.txt".len();
    bytes[payload_offset] ^= 0xFF;

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut reader = archive.get_input_stream("a.txt", MatchMode::Ignore).unwrap();
    let mut out = Vec::new();
    let err = reader.read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn empty_archive_locates_its_own_eocd() {
    let bytes = write_archive(&[]);
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert!(archive.is_empty());
    assert_eq!(archive.len(), 0);
}

#[test]
fn archive_comment_up_to_max_length_is_preserved() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_stored_entry("x").unwrap();
    writer.write_data(b"y").unwrap();
    let comment = "c".repeat(65_535);
    writer.set_archive_comment(comment.clone());
    let bytes = writer.finish().unwrap().into_inner();

    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.archive_comment(), comment.as_str());
}

#[test]
fn archive_prefixed_with_arbitrary_bytes_still_locates_eocd() {
    // The central directory's recorded local header offset is relative to
    // wherever the archive itself starts, not necessarily this file's
    // start: `ZipArchive` must still find the right bytes after an
    // arbitrary prefix (the self-extracting-archive case).
    let archive_bytes = write_archive(&[("only.txt", b"payload", CompressionMethod::Stored)]);
    let mut prefixed = b"#!/bin/sh\nexit 0\n".to_vec();
    prefixed.extend_from_slice(&archive_bytes);

    let mut archive = ZipArchive::new(Cursor::new(prefixed)).unwrap();
    assert_eq!(archive.len(), 1);

    let mut out = Vec::new();
    archive
        .get_input_stream("only.txt", MatchMode::Ignore)
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, b"payload");
}

#[test]
fn filename_longer_than_1023_bytes_round_trips() {
    let name = format!("dir/{}.txt", "x".repeat(1200));
    assert!(name.len() > 1023 && name.len() <= u16::MAX as usize);
    let bytes = write_archive(&[(name.as_str(), b"content", CompressionMethod::Stored)]);

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = Vec::new();
    archive
        .get_input_stream(&name, MatchMode::Ignore)
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, b"content");
}

// Concrete scenario 1: a one-entry STORED archive's exact byte layout.
#[test]
fn stored_entry_produces_the_expected_byte_layout() {
    let bytes = write_archive(&[("a.txt", b"hello", CompressionMethod::Stored)]);

    assert_eq!(&bytes[0..4], &[0x50, 0x4B, 0x03, 0x04]);
    assert_eq!(&bytes[30..35], b"hello");

    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 1);
    let central = &archive.entries()[0];
    assert_eq!(central.local.entry_offset, 0);
    // cdir_offset == local header (30 + 5 name) + 5 bytes of payload.
    assert_eq!(30 + 5 + 5, 40);
}

// Concrete scenario 2: 1 MiB of zeroes, DEFLATE level 6.
#[test]
fn one_mib_of_zeroes_compresses_small_and_checksums_correctly() {
    let data = vec![0u8; 1024 * 1024];
    let bytes = write_archive(&[("b.bin", &data, CompressionMethod::Deflated)]);

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let central = archive.get_entry("b.bin", MatchMode::Ignore).unwrap();
    assert!((central.local.compressed_size as usize) < 2048);
    assert_eq!(central.local.crc32, 0x8A91_36AA);

    let mut out = Vec::new();
    archive
        .get_input_stream("b.bin", MatchMode::Ignore)
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, data);
}

// Concrete scenario 3 & 4: exact and path-tail lookup.
#[test]
fn exact_lookup_and_path_tail_lookup_match_the_spec_examples() {
    let bytes = write_archive(&[
        ("x", b"1", CompressionMethod::Stored),
        ("y", b"2", CompressionMethod::Stored),
        ("z", b"3", CompressionMethod::Stored),
    ]);
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(
        archive.get_entry("y", MatchMode::Ignore).unwrap().filename(),
        "y"
    );
    assert!(archive.get_entry("w", MatchMode::Ignore).is_none());

    let bytes = write_archive(&[
        ("src/lib/x.h", b"a", CompressionMethod::Stored),
        ("include/x.h", b"b", CompressionMethod::Stored),
    ]);
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(
        archive.get_entry("x.h", MatchMode::Match).unwrap().filename(),
        "src/lib/x.h"
    );
}

// Concrete scenario 5: corrupt EOCD signature.
#[test]
fn corrupted_eocd_signature_fails_with_format_error() {
    let mut bytes = write_archive(&[("a.txt", b"hi", CompressionMethod::Stored)]);
    let len = bytes.len();
    // EOCD is the last 22 bytes (no comment, single entry).
    bytes[len - 22..len - 18].copy_from_slice(&[0, 0, 0, 0]);

    let err = ZipArchive::new(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
}

// Concrete scenario 6: truncated central directory.
#[test]
fn truncated_central_directory_fails_with_format_error() {
    let bytes = write_archive(&[
        ("a.txt", b"aaaa", CompressionMethod::Stored),
        ("b.txt", b"bbbb", CompressionMethod::Stored),
    ]);

    // Locate the EOCD (last 22 bytes here), then chop 10 bytes out of the
    // central directory while updating cdir_size/cdir_offset bookkeeping by
    // simply truncating the file right after the first CD record ends
    // partway through the second.
    let eocd_start = bytes.len() - 22;
    let cdir_offset = u32::from_le_bytes(bytes[eocd_start + 16..eocd_start + 20].try_into().unwrap());
    let cdir_size = u32::from_le_bytes(bytes[eocd_start + 12..eocd_start + 16].try_into().unwrap());

    let mut truncated = bytes[..cdir_offset as usize + cdir_size as usize - 10].to_vec();
    // Re-append an EOCD claiming the same entry count/offset, so locate()
    // still finds a well-formed trailer pointing at the now-truncated CD.
    let mut eocd = bytes[eocd_start..].to_vec();
    eocd[12..16].copy_from_slice(&(cdir_size - 10).to_le_bytes());
    truncated.extend_from_slice(&eocd);

    let err = ZipArchive::new(Cursor::new(truncated)).unwrap_err();
    assert!(matches!(err, Error::Format(_) | Error::Io(_)));
}

#[test]
fn gzip_single_member_round_trips_with_filename_and_trailer_check() {
    let mut writer = GzipOutputBuf::with_filename(Vec::new(), "notes.txt").unwrap();
    writer.write_all(b"a short gzip payload").unwrap();
    let bytes = writer.finish().unwrap();

    let mut reader = GzipInputBuf::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.filename(), Some("notes.txt"));
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"a short gzip payload");
    reader.finish().unwrap();
}

#[test]
fn gzip_trailer_mismatch_is_rejected() {
    let mut writer = GzipOutputBuf::new(Vec::new()).unwrap();
    writer.write_all(b"payload").unwrap();
    let mut bytes = writer.finish().unwrap();
    let len = bytes.len();
    bytes[len - 1] ^= 0xFF; // corrupt the stored size

    let mut reader = GzipInputBuf::new(Cursor::new(bytes)).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert!(matches!(reader.finish(), Err(Error::Format(_))));
}

#[test]
fn close_entry_leaves_cursor_positioned_for_the_next_local_header() {
    use rzipc::ZipInputBuf;

    let bytes = write_archive(&[
        ("one.txt", b"first payload", CompressionMethod::Stored),
        ("two.txt", b"second payload, a bit longer", CompressionMethod::Deflated),
    ]);

    let mut cursor = Cursor::new(bytes);
    let mut buf = ZipInputBuf::new(&mut cursor);

    let first = buf.get_next_entry().unwrap();
    assert_eq!(first.filename, "one.txt");
    let expected_next = first.entry_offset + first.header_size() + first.compressed_size as u64;

    let second = buf.get_next_entry().unwrap();
    assert_eq!(second.filename, "two.txt");
    assert_eq!(second.entry_offset, expected_next);
}
