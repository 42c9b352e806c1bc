use std::io;

use jpc::{
    read_codestream, read_header, read_region, Codestream, CodestreamError, CodestreamState,
    EndOfStream, IssueKind, MarkerId, MarkerSegmentReader, ProgressionOrder, ResolutionLevel,
};
use proptest::prelude::*;


fn markers(codestream: &Codestream) -> Vec<MarkerId> {
    codestream.segments().iter().map(|s| s.marker_id()).collect()
}

#[test]
fn test_complete_codestream() -> Result<(), CodestreamError> {
    shared::init_logger();
    let data = shared::large_codestream();
    let mut issues = vec![];
    let codestream = read_codestream(&data, 0, &mut issues)?;

    assert!(issues.is_empty());
    assert_eq!(codestream.state(), CodestreamState::Complete);
    assert_eq!(codestream.last_segment().map(|s| s.marker_id()), Some(MarkerId::EOC));
    assert_eq!(
        markers(&codestream),
        vec![
            MarkerId::SOC,
            MarkerId::SIZ,
            MarkerId::COD,
            MarkerId::QCD,
            MarkerId::COM,
            MarkerId::SOT,
            MarkerId::SOD,
            MarkerId::SOT,
            MarkerId::SOD,
            MarkerId::EOC
        ]
    );
    assert_eq!(codestream.tile_parts().len(), 2);
    assert_eq!(codestream.tile_parts()[1].tile_index(), 1);
    assert_eq!(codestream.tile_parts()[1].data().len(), 4500);
    Ok(())
}

#[test]
fn test_main_header_views() -> Result<(), CodestreamError> {
    let data = shared::large_codestream();
    let mut issues = vec![];
    let codestream = read_codestream(&data, 0, &mut issues)?;

    let siz = codestream.image_and_tile_size_marker_segment().unwrap();
    assert_eq!(siz.offset(), 2);
    assert_eq!(siz.width(), 64);
    assert_eq!(siz.height(), 64);
    assert_eq!(siz.no_components(), 3);
    assert_eq!(siz.no_tiles(), 1);
    assert_eq!(siz.components()[0].precision(), 8);
    assert!(!siz.components()[0].values_are_signed());

    let cod = codestream.coding_style_marker_segment().unwrap();
    assert_eq!(cod.progression_order(), ProgressionOrder::LRCP);
    assert_eq!(cod.no_layers(), 1);
    assert_eq!(cod.no_decomposition_levels(), 2);
    assert_eq!(codestream.main_header().len(), 5);
    Ok(())
}

#[test]
fn test_read_region_complete() -> Result<(), Box<dyn std::error::Error>> {
    let data = shared::large_codestream();
    let mut issues = vec![];
    let codestream = read_codestream(&data, 0, &mut issues)?;
    assert_eq!(read_region(&codestream, ResolutionLevel::Full)?, data);
    assert_eq!(read_region(&codestream, ResolutionLevel::Lowest)?, data);
    Ok(())
}

#[test]
fn test_truncated_by_one_byte() -> Result<(), CodestreamError> {
    shared::init_logger();
    let data = shared::large_codestream();
    let mut issues = vec![];
    let codestream = read_codestream(&data[..data.len() - 1], 0, &mut issues)?;

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind(), IssueKind::TruncatedCodestream);
    assert_ne!(codestream.last_segment().map(|s| s.marker_id()), Some(MarkerId::EOC));
    let error = read_region(&codestream, ResolutionLevel::Full).unwrap_err();
    assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    Ok(())
}

#[test]
fn test_truncated_by_5000_bytes() -> Result<(), CodestreamError> {
    let data = shared::large_codestream();
    let mut issues = vec![];
    let codestream = read_codestream(&data[..data.len() - 5000], 0, &mut issues)?;

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind(), IssueKind::TruncatedCodestream);
    assert!(codestream.is_truncated());
    assert_eq!(codestream.last_segment().map(|s| s.marker_id()), Some(MarkerId::SOD));
    assert!(!codestream.tile_parts()[0].is_complete());
    for level in &[
        ResolutionLevel::Full,
        ResolutionLevel::Reduced(1),
        ResolutionLevel::Lowest,
    ] {
        let error = read_region(&codestream, *level).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }
    Ok(())
}

#[test]
fn test_header_of_truncated_codestream() -> Result<(), CodestreamError> {
    let data = shared::large_codestream();
    let header = shared::main_header(2);
    let mut issues = vec![];
    let codestream = read_codestream(&data[..data.len() - 5000], 0, &mut issues)?;
    assert_eq!(read_header(&codestream), header);
    Ok(())
}

#[test]
fn test_psot_zero_last_tile_part() -> Result<(), CodestreamError> {
    let mut data = shared::main_header(1);
    data.extend_from_slice(&shared::tile_part(0, 0, 2, &shared::tile_data(100, 3), false));
    data.extend_from_slice(&shared::tile_part(0, 1, 2, &shared::tile_data(50, 4), true));
    data.extend_from_slice(&[0xFF, 0xD9]);

    let mut issues = vec![];
    let codestream = read_codestream(&data, 0, &mut issues)?;
    assert!(issues.is_empty());
    assert_eq!(codestream.tile_parts().len(), 2);
    assert_eq!(codestream.tile_parts()[1].part_index(), 1);
    assert_eq!(codestream.tile_parts()[1].length(), 0);
    assert_eq!(codestream.tile_parts()[1].data().len(), 50);
    assert_eq!(codestream.to_bytes(), data);
    Ok(())
}

#[test]
fn test_unknown_marker_in_main_header() -> Result<(), CodestreamError> {
    let mut data = shared::main_header(2);
    data.extend_from_slice(&[0xFF, 0x7A, 0x00, 0x05, 0x01, 0x02, 0x03]);
    let unknown_offset = data.len() as u64 - 7;
    data.extend_from_slice(&shared::tile_part(0, 0, 1, &shared::tile_data(10, 0), false));
    data.extend_from_slice(&[0xFF, 0xD9]);

    let mut issues = vec![];
    let codestream = read_codestream(&data, 0, &mut issues)?;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind(), IssueKind::UnknownMarker);
    assert_eq!(issues[0].offset(), Some(unknown_offset));
    assert_eq!(codestream.state(), CodestreamState::Complete);
    Ok(())
}

#[test]
fn test_reserved_markers_have_no_length() -> Result<(), CodestreamError> {
    let data = [0xFF, 0x4F, 0xFF, 0x30, 0xFF, 0x3F, 0xFF, 0xD9];
    let mut issues = vec![];
    let codestream = read_codestream(&data, 0, &mut issues)?;
    assert!(issues.is_empty());
    assert_eq!(
        markers(&codestream),
        vec![
            MarkerId::SOC,
            MarkerId::Reserved(0xFF30),
            MarkerId::Reserved(0xFF3F),
            MarkerId::EOC
        ]
    );
    Ok(())
}

#[test]
fn test_reader_yields_segments_then_end() {
    let data = shared::codestream(&[shared::tile_data(20, 0)]);
    let items: Vec<_> = MarkerSegmentReader::with_base(&data, 100).collect();
    assert_eq!(items.len(), 9);
    assert_eq!(items[0].as_ref().map(|s| s.offset()), Ok(100));
    assert_eq!(items[8], Err(EndOfStream::Complete));

    let truncated = &data[..data.len() - 1];
    let mut reader = MarkerSegmentReader::new(truncated);
    let mut count = 0;
    let end = loop {
        match reader.next_segment() {
            Ok(_) => count += 1,
            Err(end) => break end,
        }
    };
    assert_eq!(count, 7);
    assert_eq!(
        end,
        EndOfStream::Truncated {
            offset: truncated.len() as u64 - 1
        }
    );
    assert_eq!(reader.issues().len(), 1);
}

#[test]
fn test_segment_offsets_slice_original() -> Result<(), CodestreamError> {
    let data = shared::large_codestream();
    let mut issues = vec![];
    let codestream = read_codestream(&data, 0, &mut issues)?;
    for segment in codestream.segments() {
        let start = segment.offset() as usize;
        let end = start + segment.raw_length() as usize;
        assert_eq!(&data[start..end], segment.to_bytes().as_slice());
    }
    for tile_part in codestream.tile_parts() {
        let start = tile_part.data_offset() as usize;
        assert_eq!(&data[start..start + tile_part.data().len()], tile_part.data());
    }
    Ok(())
}

proptest! {
    #[test]
    fn truncated_codestream_warns_once(cut in any::<prop::sample::Index>()) {
        let data = shared::codestream(&[shared::tile_data(300, 7), shared::tile_data(200, 9)]);
        // Remove between 1 and len - 2 bytes, keeping at least the SOC marker.
        let removed = 1 + cut.index(data.len() - 2);
        let mut issues = vec![];
        let codestream = read_codestream(&data[..data.len() - removed], 0, &mut issues).unwrap();

        prop_assert_eq!(issues.len(), 1);
        prop_assert_eq!(issues[0].kind(), IssueKind::TruncatedCodestream);
        prop_assert!(codestream.is_truncated());
        prop_assert_ne!(codestream.last_segment().map(|s| s.marker_id()), Some(MarkerId::EOC));
    }

    #[test]
    fn reading_twice_gives_equal_results(cut in any::<prop::sample::Index>()) {
        let data = shared::codestream(&[shared::tile_data(64, 5)]);
        let end = 2 + cut.index(data.len() - 1);
        let mut first_issues = vec![];
        let mut second_issues = vec![];
        let first = read_codestream(&data[..end], 0, &mut first_issues);
        let second = read_codestream(&data[..end], 0, &mut second_issues);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_issues, second_issues);
    }

    #[test]
    fn segment_offsets_are_increasing(base in 0u64..1_000_000) {
        let data = shared::codestream(&[shared::tile_data(32, 1), shared::tile_data(16, 2)]);
        let mut issues = vec![];
        let codestream = read_codestream(&data, base, &mut issues).unwrap();
        let offsets: Vec<u64> = codestream.segments().iter().map(|s| s.offset()).collect();
        prop_assert_eq!(offsets[0], base);
        prop_assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }
}
