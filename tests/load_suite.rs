use std::path::Path;

use figload::graph_dump::GraphDump;
use figload::reader::Phase;
use figload::{Canvas, Config, GraphHost, LoadError, LoadReport, Reader, ReaderConfig};

fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_fixture(name: &str, reader: &Reader) -> (Canvas, LoadReport) {
    let input = std::fs::read_to_string(fixture_path(name)).expect("fixture read failed");
    let mut canvas = Canvas::new();
    let report = reader
        .unmarshal_with_report(&mut canvas, input.as_str())
        .expect("document rejected");
    (canvas, report)
}

#[test]
fn load_all_fixtures() {
    // Keep this list explicit so new fixtures must be added intentionally.
    // (name, figures, lines, diagnostics)
    let candidates = [
        ("basic.json", 2, 1, 0),
        ("forward_reference.json", 2, 2, 0),
        ("grouped.json", 5, 1, 0),
        ("draw2d_compat.json", 3, 1, 0),
        ("partial_failure.json", 3, 0, 7),
        ("crossing.json", 4, 3, 0),
    ];

    let reader = Reader::new();
    for (name, figures, lines, diagnostics) in candidates {
        assert!(fixture_path(name).exists(), "fixture missing: {name}");
        let (canvas, report) = load_fixture(name, &reader);
        assert_eq!(canvas.figures().len(), figures, "{name}: figures");
        assert_eq!(canvas.lines().len(), lines, "{name}: lines");
        assert_eq!(report.diagnostics.len(), diagnostics, "{name}: diagnostics");
        assert_eq!(report.figures.len(), figures + lines, "{name}: result set");
        assert_eq!(canvas.decoration_passes(), 1, "{name}: decorations");

        let dump = GraphDump::from_canvas(&canvas, &report.diagnostics).expect("dump failed");
        serde_json::to_string(&dump).expect("dump serialization failed");
    }
}

#[test]
fn reloading_gives_identical_graphs() {
    let reader = Reader::new();
    for name in ["basic.json", "grouped.json", "draw2d_compat.json"] {
        let (first, _) = load_fixture(name, &reader);
        let (second, _) = load_fixture(name, &reader);
        let first = serde_json::to_value(GraphDump::from_canvas(&first, &[]).unwrap()).unwrap();
        let second = serde_json::to_value(GraphDump::from_canvas(&second, &[]).unwrap()).unwrap();
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn forward_references_need_deferral() {
    let (canvas, report) = load_fixture("forward_reference.json", &Reader::new());
    assert!(report.is_clean());
    let looped = canvas.get_line("C2").unwrap();
    let looped = looped.borrow();
    // source port, four bend points, target port
    assert_eq!(looped.as_connectable().unwrap().route().len(), 6);

    let strict = Reader::new().with_config(ReaderConfig::strict()).unwrap();
    let (canvas, report) = load_fixture("forward_reference.json", &strict);
    assert!(canvas.lines().is_empty());
    let messages: Vec<String> = report
        .diagnostics
        .iter()
        .map(|d| d.error.to_string())
        .collect();
    assert_eq!(
        messages,
        ["source figure A not found", "source figure B not found"]
    );
}

#[test]
fn group_members_include_connections() {
    let (canvas, _) = load_fixture("grouped.json", &Reader::new());
    let group = canvas.get_figure("G").unwrap();
    let group = group.borrow();
    assert_eq!(
        group.as_composite().unwrap().members(),
        ["A".to_string(), "B".to_string(), "C1".to_string()]
    );
    let raft = canvas.get_figure("R").unwrap();
    assert_eq!(
        raft.borrow().as_composite().unwrap().members(),
        ["T".to_string()]
    );
}

#[test]
fn qualified_type_names_and_port_tables_are_honoured() {
    let (canvas, report) = load_fixture("draw2d_compat.json", &Reader::new());
    assert!(report.is_clean());
    let rect = canvas
        .get_figure("b5a3c9b6-1f1e-4c2b-9c1f-6b8a2d9f0c11")
        .unwrap();
    let rect = rect.borrow();
    assert_eq!(rect.type_name(), "Rectangle");
    assert_eq!(rect.ports().len(), 3);
    assert!(rect.port("hybrid0").is_some());

    let circle = canvas
        .get_figure("e0b7d7f2-39a3-4f4e-8d1b-2a0a9f3e7c55")
        .unwrap();
    assert_eq!(circle.borrow().type_name(), "Circle");

    let line = canvas.get_lines().remove(0);
    let line = line.borrow();
    let persisted = line.persistent_attributes();
    assert_eq!(
        persisted.get("router").and_then(|v| v.as_str()),
        Some("draw2d.layout.connection.ManhattanConnectionRouter")
    );
    assert_eq!(line.as_connectable().unwrap().route().len(), 6);
}

#[test]
fn partial_failures_are_reported_per_record() {
    let (canvas, report) = load_fixture("partial_failure.json", &Reader::new());
    let failed: Vec<(usize, Phase)> = report
        .diagnostics
        .iter()
        .map(|d| (d.index, d.phase))
        .collect();
    assert_eq!(
        failed,
        [
            (1, Phase::Instantiate),
            (3, Phase::Instantiate),
            (4, Phase::Instantiate),
            (5, Phase::Instantiate),
            (6, Phase::Instantiate),
            (7, Phase::Instantiate),
            (8, Phase::Group),
        ]
    );
    assert!(matches!(report.diagnostics[0].error, LoadError::UnknownType(_)));
    assert!(report.diagnostics[1].error.to_string().contains('Z'));
    assert!(matches!(report.diagnostics[2].error, LoadError::Attribute(_)));
    assert!(matches!(report.diagnostics[3].error, LoadError::DuplicateId(_)));
    assert_eq!(canvas.get_figure("A").unwrap().borrow().type_name(), "Oval");
    assert!(canvas.get_figure("W").is_none());
    assert!(canvas.get_figure("C").is_some());
}

#[test]
fn crossing_decorations_cover_the_whole_graph() {
    let (canvas, _) = load_fixture("crossing.json", &Reader::new());
    let counts: Vec<usize> = canvas
        .lines()
        .iter()
        .map(|line| line.borrow().as_connectable().unwrap().crossings().len())
        .collect();
    assert_eq!(counts, [1, 1, 0]);
    assert_eq!(canvas.lines_to_repaint().len(), 3);

    let config: Config = serde_json::from_str(r#"{"crossing": {"enabled": false}}"#).unwrap();
    let (canvas, _) = figload::cli::load(
        &std::fs::read_to_string(fixture_path("crossing.json")).unwrap(),
        config,
    )
    .unwrap();
    assert!(
        canvas
            .lines()
            .iter()
            .all(|line| line.borrow().as_connectable().unwrap().crossings().is_empty())
    );
}
