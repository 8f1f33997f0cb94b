use tracker_sync::flags::{
    self, ColorCoding, ColorPair, ColorStop, FlagKey, FlagValue, MonthViewType, NumberCombine,
    ProgressBounds,
};

fn color_coding() -> FlagValue {
    FlagValue::NumberColorCoding(flags::ColorMapper::new(ColorCoding {
        enabled: true,
        stops: vec![
            ColorStop {
                value: 1.0,
                color: ColorPair::new("#fee2e2", "#7f1d1d"),
            },
            ColorStop {
                value: 5.0,
                color: ColorPair::new("#dcfce7", "#14532d"),
            },
        ],
    }))
}

#[test]
fn test_defaults() {
    assert_eq!(flags::default_for(FlagKey::Favorite).as_bool(), Some(false));
    assert_eq!(flags::default_for(FlagKey::NoteEnabled).as_bool(), Some(true));
    assert_eq!(
        flags::default_for(FlagKey::MonthViewType).as_month_view(),
        Some(MonthViewType::Calendar)
    );
    assert_eq!(
        flags::default_for(FlagKey::NumberCombine).as_combine(),
        Some(NumberCombine::Sum)
    );
    let progress = flags::default_for(FlagKey::NumberProgressBounds);
    assert_eq!(progress.as_progress().unwrap().map(5.0), None);
    let coding = flags::default_for(FlagKey::NumberColorCoding);
    assert_eq!(
        coding.as_color_coding().unwrap().value_to_color(5.0),
        ColorPair::neutral()
    );
    for key in FlagKey::ALL {
        assert_eq!(flags::default_for(key).key(), key);
    }
}

#[test]
fn test_parse_falls_back_to_default() {
    let cases = [
        ("not json", FlagKey::Favorite),
        ("\"yes\"", FlagKey::NoteEnabled),
        ("\"grid\"", FlagKey::MonthViewType),
        ("{\"lighter\":\"red\",\"darker\":\"#000000\"}", FlagKey::BooleanCheckedColor),
        ("{\"enabled\":true,\"min\":10,\"max\":5}", FlagKey::NumberProgressBounds),
        ("{\"enabled\":true,\"stops\":[{\"value\":1}]}", FlagKey::NumberColorCoding),
    ];
    for (raw, key) in cases {
        assert!(flags::parse_strict(raw, key).is_err(), "{} should be rejected", raw);
        assert_eq!(flags::parse(raw, key), flags::default_for(key));
    }
}

#[test]
fn test_parse_valid_values() {
    assert_eq!(flags::parse("true", FlagKey::Favorite), FlagValue::Favorite(true));
    assert_eq!(
        flags::parse("\"list\"", FlagKey::MonthViewType),
        FlagValue::MonthViewType(MonthViewType::List)
    );
    assert_eq!(
        flags::parse("\"average\"", FlagKey::NumberCombine),
        FlagValue::NumberCombine(NumberCombine::Average)
    );

    let progress = flags::parse(
        "{\"enabled\":true,\"min\":0,\"max\":200}",
        FlagKey::NumberProgressBounds,
    );
    assert_eq!(progress.as_progress().unwrap().map(50.0), Some(25.0));
}

#[test]
fn test_serialize_round_trip() {
    let values = vec![
        FlagValue::Favorite(true),
        FlagValue::NoteEnabled(false),
        FlagValue::MonthViewType(MonthViewType::List),
        FlagValue::NumberCombine(NumberCombine::Last),
        FlagValue::NumberProgressBounds(flags::ProgressMapper::new(ProgressBounds {
            enabled: true,
            min: Some(1.0),
            max: None,
        })),
        color_coding(),
        FlagValue::BooleanCheckedColor(ColorPair::new("#abcdef", "#012345")),
        FlagValue::BooleanUncheckedColor(ColorPair::neutral()),
    ];
    for value in values {
        let raw = flags::serialize(&value).unwrap();
        assert_eq!(flags::parse_strict(&raw, value.key()).unwrap(), value);
    }
}

#[test]
fn test_serialize_writes_input_shape() {
    let raw = flags::serialize(&color_coding()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["enabled"], true);
    assert_eq!(json["stops"].as_array().unwrap().len(), 2);
    assert_eq!(json["stops"][0]["color"]["lighter"], "#fee2e2");

    let raw = flags::serialize(&flags::default_for(FlagKey::NumberProgressBounds)).unwrap();
    assert_eq!(raw, "{\"enabled\":false}");
}

#[test]
fn test_serialize_rejects_invalid_input() {
    let value = FlagValue::BooleanCheckedColor(ColorPair::new("green", "#000000"));
    assert!(flags::serialize(&value).is_err());
}

#[test]
fn test_color_coding_mapper() {
    let value = color_coding();
    let mapper = value.as_color_coding().unwrap();
    assert_eq!(mapper.value_to_color(0.0), ColorPair::neutral());
    assert_eq!(mapper.value_to_color(-3.0), ColorPair::new("#fee2e2", "#7f1d1d"));
    assert_eq!(mapper.value_to_color(5.0), ColorPair::new("#dcfce7", "#14532d"));

    let between = mapper.value_to_color(3.0);
    assert_ne!(between, ColorPair::new("#fee2e2", "#7f1d1d"));
    assert_ne!(between, ColorPair::new("#dcfce7", "#14532d"));
    assert!(between.lighter.starts_with('#') && between.lighter.len() == 7);
}

#[test]
fn test_combine() {
    let values = [1.0, 2.0, 6.0];
    assert_eq!(NumberCombine::Sum.combine(&values), Some(9.0));
    assert_eq!(NumberCombine::Last.combine(&values), Some(6.0));
    assert_eq!(NumberCombine::Average.combine(&values), Some(3.0));
    assert_eq!(NumberCombine::Sum.combine(&[]), None);
}

#[test]
fn test_flag_key_names() {
    for key in FlagKey::ALL {
        assert_eq!(key.as_str().parse::<FlagKey>().unwrap(), key);
    }
    assert!("unknown-flag".parse::<FlagKey>().is_err());
}
