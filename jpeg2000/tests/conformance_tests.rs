use jpeg2000::{
    parse, parse_with_options, validate, CodecVersion, ColourMethod, FatalError, IssueKind,
    ParseOptions, Root, ValidatorConfig,
};
use proptest::prelude::*;


const RESTRICTED_ICC: u8 = 2;
const ANY_ICC: u8 = 3;

#[test]
fn test_jp2_brand_with_any_icc_method() -> Result<(), FatalError> {
    shared::init_logger();
    let profile = shared::icc_profile(b"scnr", "Camera RGB");
    let data = shared::jp2_file(
        b"jp2 ",
        &[b"jp2 "],
        &[shared::colr_icc(ANY_ICC, &profile)],
        &shared::codestream(),
    );
    let model = parse(&data)?;

    assert_eq!(model.issues().len(), 1, "{:?}", model.issues());
    assert_eq!(
        model.issues()[0].kind(),
        IssueKind::IncompatibleBrandForICCMethod
    );
    // signature (12) + ftyp (20) + jp2h header (8) + ihdr (22)
    assert_eq!(model.issues()[0].offset(), Some(62));
    // Readers of the 'jp2 ' brand have no usable colour specification.
    assert!(model.colour_specification().is_none());
    Ok(())
}

#[test]
fn test_jpx_brand_with_any_icc_method() -> Result<(), FatalError> {
    let profile = shared::icc_profile(b"scnr", "Camera RGB");
    let data = shared::jp2_file(
        b"jpx ",
        &[b"jpx ", b"jp2 "],
        &[shared::colr_icc(ANY_ICC, &profile)],
        &shared::codestream(),
    );
    let model = parse(&data)?;

    assert!(model.issues().is_empty(), "{:?}", model.issues());
    let colour_specification = model.colour_specification().unwrap();
    assert_eq!(colour_specification.method_kind(), ColourMethod::AnyICC);
    let icc_profile = colour_specification.icc_profile().unwrap();
    assert_eq!(icc_profile.description(), Some("Camera RGB"));
    Ok(())
}

#[test]
fn test_conflicting_colour_specifications() -> Result<(), FatalError> {
    let restricted = shared::icc_profile(b"mntr", "sRGB IEC61966-2.1");
    let any = shared::icc_profile(b"scnr", "Camera RGB");
    let data = shared::jp2_file(
        b"jpx ",
        &[b"jpx ", b"jp2 "],
        &[
            shared::colr_icc(RESTRICTED_ICC, &restricted),
            shared::colr_icc(ANY_ICC, &any),
            shared::colr_icc(ANY_ICC, &any),
        ],
        &shared::codestream(),
    );
    let model = parse(&data)?;

    assert_eq!(model.issues().len(), 1, "{:?}", model.issues());
    assert_eq!(
        model.issues()[0].kind(),
        IssueKind::ConflictingColourSpecifications
    );
    // The first conformant one wins.
    let colour_specification = model.colour_specification().unwrap();
    assert_eq!(colour_specification.method_kind(), ColourMethod::RestrictedICC);
    Ok(())
}

#[test]
fn test_agreeing_colour_specifications() -> Result<(), FatalError> {
    let profile = shared::icc_profile(b"mntr", "sRGB IEC61966-2.1");
    let data = shared::jp2_file(
        b"jpx ",
        &[b"jpx ", b"jp2 "],
        &[
            shared::colr_enumerated(16),
            shared::colr_icc(RESTRICTED_ICC, &profile),
            shared::colr_icc(ANY_ICC, &profile),
        ],
        &shared::codestream(),
    );
    let model = parse(&data)?;

    assert!(model.issues().is_empty(), "{:?}", model.issues());
    let colour_specification = model.colour_specification().unwrap();
    assert_eq!(colour_specification.method_kind(), ColourMethod::Enumerated);
    Ok(())
}

#[test]
fn test_jp2_brand_with_both_icc_methods() -> Result<(), FatalError> {
    let restricted = shared::icc_profile(b"mntr", "sRGB IEC61966-2.1");
    let any = shared::icc_profile(b"prtr", "Press");
    let data = shared::jp2_file(
        b"jp2 ",
        &[b"jp2 "],
        &[
            shared::colr_icc(ANY_ICC, &any),
            shared::colr_icc(RESTRICTED_ICC, &restricted),
        ],
        &shared::codestream(),
    );
    let model = parse(&data)?;

    assert_eq!(model.count_issues(IssueKind::IncompatibleBrandForICCMethod), 1);
    assert_eq!(model.count_issues(IssueKind::ConflictingColourSpecifications), 1);
    // The Any ICC box comes first but is not for 'jp2 ' readers.
    let colour_specification = model.colour_specification().unwrap();
    assert_eq!(colour_specification.method_kind(), ColourMethod::RestrictedICC);
    Ok(())
}

#[test]
fn test_malformed_icc_profile() -> Result<(), FatalError> {
    let mut profile = shared::icc_profile(b"mntr", "sRGB");
    profile[36..40].copy_from_slice(b"xxxx");
    let data = shared::jp2_file(
        b"jp2 ",
        &[b"jp2 "],
        &[shared::colr_icc(RESTRICTED_ICC, &profile)],
        &shared::codestream(),
    );
    let model = parse(&data)?;
    assert_eq!(model.count_issues(IssueKind::MalformedIccProfile), 1);
    assert!(model.colour_specification().unwrap().icc_profile().is_none());
    Ok(())
}

#[test]
fn test_truncation_rule_needs_codec_version() -> Result<(), FatalError> {
    let data = shared::codestream();
    let mut reader_issues = vec![];
    let codestream = jpc::read_codestream(&data[..data.len() - 1], 0, &mut reader_issues)?;
    let root = Root::Codestream(codestream);

    // Without the reader's warning the rule reports the truncation itself.
    let found = validate(&root, &[], &ValidatorConfig::default());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind(), IssueKind::TruncatedCodestream);
    assert_eq!(found[0].offset(), Some(data.len() as u64 - 1));

    let found = validate(&root, &[], &ValidatorConfig::for_codec(CodecVersion::new(1, 3)));
    assert!(found.is_empty());

    let found = validate(&root, &reader_issues, &ValidatorConfig::default());
    assert!(found.is_empty());
    Ok(())
}

#[test]
fn test_codec_version_keeps_other_rules() -> Result<(), FatalError> {
    let profile = shared::icc_profile(b"scnr", "Camera RGB");
    let data = shared::jp2_file(
        b"jp2 ",
        &[b"jp2 "],
        &[shared::colr_icc(ANY_ICC, &profile)],
        &shared::codestream(),
    );
    let options = ParseOptions {
        validator: ValidatorConfig::for_codec("1.3.0".parse().unwrap()),
        ..ParseOptions::default()
    };
    let model = parse_with_options(&data, &options)?;
    assert_eq!(model.count_issues(IssueKind::IncompatibleBrandForICCMethod), 1);
    Ok(())
}

fn truncation_issues(codec: &str, data: &[u8]) -> Result<usize, FatalError> {
    let options = ParseOptions {
        validator: ValidatorConfig::for_codec(codec.parse().unwrap()),
        ..ParseOptions::default()
    };
    let model = parse_with_options(data, &options)?;
    // The model itself still knows, whatever is reported.
    assert!(model.is_truncated());
    let error = jpeg2000::read_region(&model, jpeg2000::ResolutionLevel::Full).unwrap_err();
    assert_eq!(error.kind(), std::io::ErrorKind::UnexpectedEof);
    Ok(model.count_issues(IssueKind::TruncatedCodestream))
}

#[test]
fn test_truncation_reported_from_codec_1_4() -> Result<(), FatalError> {
    let data = shared::codestream();
    let truncated = &data[..data.len() - 1];
    assert_eq!(truncation_issues("1.3.0", truncated)?, 0);
    assert_eq!(truncation_issues("1.4.0", truncated)?, 1);
    assert_eq!(truncation_issues("2.5.0", truncated)?, 1);

    let container = shared::jp2_file(
        b"jp2 ",
        &[b"jp2 "],
        &[shared::colr_enumerated(16)],
        &data,
    );
    let truncated = &container[..container.len() - 5000];
    assert_eq!(truncation_issues("1.3", truncated)?, 0);
    assert_eq!(truncation_issues("1.4", truncated)?, 1);
    Ok(())
}

proptest! {
    #[test]
    fn truncated_codestream_parses_with_one_warning(removed in 1usize..8100) {
        let data = shared::codestream();
        let model = parse(&data[..data.len() - removed]).unwrap();

        prop_assert_eq!(model.count_issues(IssueKind::TruncatedCodestream), 1);
        let last = model.codestream().and_then(|c| c.last_segment()).map(|s| s.marker_id());
        prop_assert_ne!(last, Some(jpeg2000::MarkerId::EOC));
        let error = jpeg2000::read_region(&model, jpeg2000::ResolutionLevel::Full).unwrap_err();
        prop_assert_eq!(error.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn parsing_twice_gives_equal_models(cut in any::<prop::sample::Index>()) {
        let profile = shared::icc_profile(b"mntr", "sRGB");
        let data = shared::jp2_file(
            b"jp2 ",
            &[b"jp2 "],
            &[shared::colr_icc(RESTRICTED_ICC, &profile), shared::colr_enumerated(16)],
            &shared::codestream_with_data(600),
        );
        let data = &data[..cut.index(data.len() + 1)];
        let first = parse(data).ok();
        let second = parse(data).ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn box_offsets_slice_original(tile_length in 1usize..3000, colours in 1usize..5) {
        let data = shared::jp2_file(
            b"jpx ",
            &[b"jpx ", b"jp2 "],
            &vec![shared::colr_enumerated(16); colours],
            &shared::codestream_with_data(tile_length),
        );
        let model = parse(&data).unwrap();
        let file = model.container().unwrap();

        for jbox in file.descendants() {
            let start = jbox.offset() as usize;
            let end = start + jbox.length() as usize;
            let bytes = jbox.to_bytes();
            prop_assert_eq!(&data[start..end], bytes.as_slice());
        }
        for segment in model.codestream().unwrap().segments() {
            let start = segment.offset() as usize;
            let end = start + segment.raw_length() as usize;
            let bytes = segment.to_bytes();
            prop_assert_eq!(&data[start..end], bytes.as_slice());
        }
        prop_assert_eq!(file.colour_specification_boxes().len(), colours);
    }
}
