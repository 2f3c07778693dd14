use super::*;
use crate::render::sink::InMemorySink;

#[test]
fn concurrency_parses_all_forms() {
    assert_eq!("auto".parse::<Concurrency>().unwrap(), Concurrency::Auto);
    assert_eq!("4".parse::<Concurrency>().unwrap(), Concurrency::Threads(4));
    assert_eq!(
        "50%".parse::<Concurrency>().unwrap(),
        Concurrency::Percent(50.0)
    );
    assert!("lots".parse::<Concurrency>().is_err());

    let from_json: Concurrency = serde_json::from_str("3").unwrap();
    assert_eq!(from_json, Concurrency::Threads(3));
    let from_json: Concurrency = serde_json::from_str("\"25%\"").unwrap();
    assert_eq!(from_json, Concurrency::Percent(25.0));
}

#[test]
fn concurrency_resolution_against_cpu_count() {
    assert_eq!(Concurrency::Auto.resolve(8).unwrap(), 4);
    assert_eq!(Concurrency::Auto.resolve(1).unwrap(), 1);
    assert_eq!(Concurrency::Threads(8).resolve(8).unwrap(), 8);
    assert!(Concurrency::Threads(9).resolve(8).is_err());
    assert!(Concurrency::Threads(0).resolve(8).is_err());
    assert_eq!(Concurrency::Percent(50.0).resolve(8).unwrap(), 4);
    assert_eq!(Concurrency::Percent(1.0).resolve(8).unwrap(), 1);
    assert!(Concurrency::Percent(0.0).resolve(8).is_err());
    assert!(Concurrency::Percent(150.0).resolve(8).is_err());
}

#[test]
fn options_deserialize_with_defaults() {
    let opts: RenderOptions =
        serde_json::from_str(r#"{ "every_nth_frame": 2, "image_format": "jpeg" }"#).unwrap();
    assert_eq!(opts.every_nth_frame, 2);
    assert_eq!(opts.image_format, ImageFormat::Jpeg);
    assert_eq!(opts.max_retries, 1);
    assert_eq!(opts.effective_jpeg_quality(), 80);
    assert!(opts.validate().is_ok());
}

#[test]
fn options_validation() {
    let mut opts = RenderOptions {
        jpeg_quality: Some(90),
        ..RenderOptions::default()
    };
    assert!(opts.validate().is_err(), "quality requires jpeg");
    opts.image_format = ImageFormat::Jpeg;
    assert!(opts.validate().is_ok());
    opts.jpeg_quality = Some(101);
    assert!(opts.validate().is_err());

    let opts = RenderOptions {
        scale: 0.0,
        ..RenderOptions::default()
    };
    assert!(opts.validate().is_err());

    let opts = RenderOptions {
        frame_timeout_ms: 0,
        ..RenderOptions::default()
    };
    assert!(opts.validate().is_err());
}

#[test]
fn cpu_budget_overrides_the_host_count() {
    let opts = RenderOptions {
        concurrency: Concurrency::Threads(6),
        cpu_budget: Some(8),
        ..RenderOptions::default()
    };
    assert_eq!(opts.resolve_concurrency().unwrap(), 6);

    let opts = RenderOptions {
        concurrency: Concurrency::Auto,
        cpu_budget: Some(8),
        ..RenderOptions::default()
    };
    assert_eq!(opts.resolve_concurrency().unwrap(), 4);

    let opts = RenderOptions {
        concurrency: Concurrency::Threads(3),
        cpu_budget: Some(2),
        ..RenderOptions::default()
    };
    assert!(opts.resolve_concurrency().is_err());

    let opts = RenderOptions {
        cpu_budget: Some(0),
        ..RenderOptions::default()
    };
    assert!(opts.validate().is_err());
}

#[test]
fn output_targets_are_mutually_exclusive() {
    let sink: Arc<dyn FrameBufferSink> = Arc::new(InMemorySink::new());
    let both = OutputTargets {
        directory: Some(PathBuf::from("out")),
        buffer_sink: Some(sink.clone()),
    };
    assert!(matches!(
        both.resolve(ImageFormat::Png),
        Err(FramecastError::Configuration(_))
    ));

    assert!(OutputTargets::default().resolve(ImageFormat::Png).is_err());
    assert!(matches!(
        OutputTargets::default().resolve(ImageFormat::None),
        Ok(OutputMode::Discard)
    ));
    assert!(
        OutputTargets::directory("out")
            .resolve(ImageFormat::None)
            .is_err()
    );
    assert!(matches!(
        OutputTargets::directory("out").resolve(ImageFormat::Webp),
        Ok(OutputMode::Directory(_))
    ));
    assert!(matches!(
        OutputTargets::buffer(sink).resolve(ImageFormat::Jpeg),
        Ok(OutputMode::Buffer(_))
    ));
}
