//! Synchronous render path: options, file contexts, error payloads.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use sassling::{IndentType, Linefeed, OutputStyle, RenderConfig, RenderError, Renderer, Value};

use common::{CountingEngine, mini_renderer};

#[test]
fn test_render_simple_rule() {
    let renderer = mini_renderer();
    let result = renderer
        .render_sync("a { color: red; }", &RenderConfig::default())
        .unwrap();
    assert_eq!(String::from_utf8(result.css).unwrap(), "a {\n  color: red;\n}\n");
    assert!(result.map.is_none());
    assert!(result.stats.included_files.is_empty());
}

#[test]
fn test_output_styles() {
    let renderer = mini_renderer();
    let source = "a { color: red; width: 2px; }";

    let compressed = RenderConfig {
        output_style: OutputStyle::Compressed,
        ..Default::default()
    };
    let css = renderer.render_sync(source, &compressed).unwrap().css;
    assert_eq!(String::from_utf8(css).unwrap(), "a{color:red;width:2px}");

    let compact = RenderConfig {
        output_style: OutputStyle::Compact,
        ..Default::default()
    };
    let css = renderer.render_sync(source, &compact).unwrap().css;
    assert_eq!(
        String::from_utf8(css).unwrap(),
        "a { color: red; width: 2px; }\n"
    );
}

#[test]
fn test_indent_and_linefeed_options() {
    let renderer = mini_renderer();
    let config = RenderConfig {
        indent_width: 1,
        indent_type: IndentType::Tab,
        linefeed: Linefeed::CrLf,
        ..Default::default()
    };
    let css = renderer
        .render_sync("a { color: red; }", &config)
        .unwrap()
        .css;
    assert_eq!(
        String::from_utf8(css).unwrap(),
        "a {\r\n\tcolor: red;\r\n}\r\n"
    );
}

#[test]
fn test_precision_bounds_function_results() {
    let renderer = mini_renderer();
    let mut config = RenderConfig {
        precision: 2,
        ..Default::default()
    };
    config.functions.insert(
        "third($n)".to_string(),
        Arc::new(|args: &[Value]| -> Result<Value, String> {
            match args.first() {
                Some(Value::Number { value, unit }) => Ok(Value::Number {
                    value: value / 3.0,
                    unit: unit.clone(),
                }),
                _ => Err("third() expects a number".to_string()),
            }
        }),
    );
    let css = renderer
        .render_sync("a { width: third(1); }", &config)
        .unwrap()
        .css;
    assert!(
        String::from_utf8(css).unwrap().contains("width: 0.33;"),
        "precision 2 should round to 0.33"
    );
}

#[test]
fn test_source_comments_annotate_rules() {
    let renderer = mini_renderer();
    let config = RenderConfig {
        source_comments: true,
        ..Default::default()
    };
    let css = renderer
        .render_sync("a { color: red; }\n\nb { margin: 0; }", &config)
        .unwrap()
        .css;
    let css = String::from_utf8(css).unwrap();
    assert!(css.contains("/* line 1, stdin */"), "got: {}", css);
    assert!(css.contains("/* line 3, stdin */"), "got: {}", css);
}

#[test]
fn test_version_passthrough() {
    let renderer = mini_renderer();
    assert!(renderer.version().starts_with("sassling-mini/"));
}

#[test]
fn test_render_file_and_relative_import() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("entry.scss");
    std::fs::write(&entry, "@import \"palette\";\na { color: $fg; }").unwrap();
    std::fs::write(dir.path().join("_palette.scss"), "$fg: teal;").unwrap();

    let renderer = mini_renderer();
    let result = renderer
        .render_file_sync(&entry, &RenderConfig::default())
        .unwrap();
    assert!(String::from_utf8(result.css).unwrap().contains("color: teal;"));
    assert_eq!(result.stats.included_files.len(), 2);
    assert!(result.stats.included_files[0].contains("entry.scss"));
    assert!(result.stats.included_files[1].contains("_palette.scss"));
}

#[test]
fn test_include_paths_resolve_imports() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.scss"), "$w: 9px;").unwrap();

    let renderer = mini_renderer();
    let config = RenderConfig {
        include_paths: vec![dir.path().to_path_buf()],
        ..Default::default()
    };
    let result = renderer
        .render_sync("@import \"lib\";\na { width: $w; }", &config)
        .unwrap();
    assert!(String::from_utf8(result.css).unwrap().contains("width: 9px;"));
}

#[test]
fn test_source_map_emission() {
    let renderer = mini_renderer();
    let config = RenderConfig {
        source_map: Some(PathBuf::from("out.css.map")),
        output_path: Some(PathBuf::from("out.css")),
        ..Default::default()
    };
    let result = renderer
        .render_sync("a { color: red; }", &config)
        .unwrap();
    let map = String::from_utf8(result.map.expect("map requested")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&map).unwrap();
    assert_eq!(parsed["version"], 3);
    let css = String::from_utf8(result.css).unwrap();
    assert!(css.contains("sourceMappingURL=out.css.map"));

    let omitted = RenderConfig {
        omit_source_map_url: true,
        ..config
    };
    let result = renderer
        .render_sync("a { color: red; }", &omitted)
        .unwrap();
    let css = String::from_utf8(result.css).unwrap();
    assert!(!css.contains("sourceMappingURL"));
    assert!(result.map.is_some());
}

#[test]
fn test_invalid_option_reported_before_any_engine_call() {
    let engine = Arc::new(CountingEngine::new());
    let renderer = Renderer::new(engine.clone());
    let config = RenderConfig {
        indent_width: 64,
        ..Default::default()
    };
    let err = renderer.render_sync("a { color: red; }", &config).unwrap_err();
    assert!(matches!(err, RenderError::InvalidOption(_)));
    assert_eq!(engine.created(), 0, "no context may exist for a bad config");
}

#[test]
fn test_compile_error_payload_shape() {
    let renderer = mini_renderer();
    let err = renderer
        .render_sync("a { width: 1px;", &RenderConfig::default())
        .unwrap_err();
    let failure = err.compile_failure().expect("compile error");
    assert_ne!(failure.status, 0);
    assert!(!failure.message.is_empty());
    assert!(failure.line.is_some());
    let json: serde_json::Value = serde_json::from_str(&failure.json).unwrap();
    assert_eq!(json["status"], 1);
    assert!(!json["message"].as_str().unwrap().is_empty());
}
