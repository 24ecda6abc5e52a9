use lineage_graph::config::{BuildConfig, SchemaSource};
use lineage_graph::controller::{ClickOutcome, CollapsePolicy, ExpansionController, MemoryBackend};
use lineage_graph::document::LineageDocument;
use lineage_graph::row::{parse_csv, parse_json, Row};

/// Two functions with one identically named dataset each, two datapoints per
/// dataset and two tables per datapoint, one table shared across functions.
const SCENARIO: &str = r#"[
    {"function_name": "f_a", "dataset_name": "sales", "datapoint": "revenue", "table_name": "DB.FIN.A_REV", "method": "QRP"},
    {"function_name": "f_a", "dataset_name": "sales", "datapoint": "revenue", "table_name": "DB.FIN.SHARED_CAL"},
    {"function_name": "f_a", "dataset_name": "sales", "datapoint": "units", "table_name": "DB.FIN.A_UNITS"},
    {"function_name": "f_a", "dataset_name": "sales", "datapoint": "units", "table_name": "DB.FIN.A_STOCK"},
    {"function_name": "f_b", "dataset_name": "sales", "datapoint": "revenue", "table_name": "DB.FIN.B_REV"},
    {"function_name": "f_b", "dataset_name": "sales", "datapoint": "revenue", "table_name": "DB.FIN.B_FX"},
    {"function_name": "f_b", "dataset_name": "sales", "datapoint": "margin", "table_name": "DB.FIN.B_MARGIN"},
    {"function_name": "f_b", "dataset_name": "sales", "datapoint": "margin", "table_name": "DB.FIN.SHARED_CAL", "method": "API"}
]"#;

fn scenario_document(config: &BuildConfig) -> LineageDocument {
    LineageDocument::build(&parse_json(SCENARIO).unwrap(), "M", config).unwrap()
}

/// One line per visible node, then one per visible edge.  Expanded nodes are
/// marked with a trailing `+`.
fn describe(ctl: &ExpansionController, backend: &MemoryBackend) -> String {
    let mut lines = vec![];
    for id in ctl.visible_nodes() {
        let node = &backend.nodes[&id];
        lines.push(format!(
            "{} ({}) \"{}\"{}",
            id,
            node.node_type,
            node.label,
            if ctl.is_expanded(&id) { " +" } else { "" }
        ));
    }
    for (from, to) in ctl.visible_edges() {
        let edge = &backend.edges[&(from.clone(), to.clone())];
        match &edge.label {
            Some(label) => lines.push(format!("{} -> {} \"{}\"", from, to, label)),
            None => lines.push(format!("{} -> {}", from, to)),
        }
    }
    lines.join("\n")
}

fn click_expands(ctl: &mut ExpansionController, backend: &mut MemoryBackend, id: &str) -> (usize, usize) {
    let nodes = ctl.visible_nodes().len();
    let edges = ctl.visible_edges().len();
    assert_eq!(ctl.click(id, backend), ClickOutcome::Expanded, "clicking {}", id);
    (ctl.visible_nodes().len() - nodes, ctl.visible_edges().len() - edges)
}

#[test]
fn test_drill_down_scenario() {
    let doc = scenario_document(&BuildConfig::default());
    let mut ctl = doc.controller();
    let mut backend = MemoryBackend::new();
    ctl.mount(&mut backend);

    insta::assert_snapshot!(describe(&ctl, &backend), @r###"
    M (model) "M" +
    f_a (function) "f_a"
    f_b (function) "f_b"
    M -> f_a
    M -> f_b
    "###);

    assert_eq!(click_expands(&mut ctl, &mut backend, "f_a"), (1, 1));
    assert_eq!(click_expands(&mut ctl, &mut backend, "f_a_sales"), (2, 2));
    assert_eq!(click_expands(&mut ctl, &mut backend, "revenue__f_a"), (2, 2));
    // Tables are leaves in the default schema so there is nothing to cascade.
    assert_eq!(ctl.settle(&mut backend), 0);

    click_expands(&mut ctl, &mut backend, "f_b");
    click_expands(&mut ctl, &mut backend, "f_b_sales");
    // Only one new node: the shared table is reused.
    assert_eq!(click_expands(&mut ctl, &mut backend, "margin__f_b"), (1, 2));
    assert_eq!(
        backend
            .edges
            .keys()
            .filter(|(_, to)| to == "DB.FIN.SHARED_CAL")
            .map(|(from, _)| from.as_str())
            .collect::<Vec<_>>(),
        vec!["margin__f_b", "revenue__f_a"]
    );

    assert_eq!(ctl.click("f_a", &mut backend), ClickOutcome::Collapsed);
    insta::assert_snapshot!(describe(&ctl, &backend), @r###"
    DB.FIN.B_MARGIN (table) "B Margin"
    DB.FIN.SHARED_CAL (table) "Shared Cal"
    M (model) "M" +
    f_a (function) "f_a"
    f_b (function) "f_b" +
    f_b_sales (dataset) "sales (2 fields)" +
    margin__f_b (datapoint) "Margin" +
    revenue__f_b (datapoint) "Revenue"
    M -> f_a
    M -> f_b
    f_b -> f_b_sales
    f_b_sales -> margin__f_b
    f_b_sales -> revenue__f_b
    margin__f_b -> DB.FIN.B_MARGIN
    margin__f_b -> DB.FIN.SHARED_CAL "API"
    "###);
    assert_eq!(backend.nodes.len(), 8);
    assert_eq!(backend.edges.len(), 7);
}

#[test]
fn test_by_id_collapse_drops_shared_table() {
    let config = BuildConfig {
        collapse_policy: CollapsePolicy::ById,
        ..BuildConfig::default()
    };
    let doc = scenario_document(&config);
    let mut ctl = doc.controller();
    let mut backend = MemoryBackend::new();
    ctl.mount(&mut backend);
    for id in ["f_a", "f_a_sales", "revenue__f_a", "f_b", "f_b_sales", "margin__f_b"] {
        ctl.click(id, &mut backend);
    }

    ctl.click("f_a", &mut backend);
    assert!(!ctl.is_visible("DB.FIN.SHARED_CAL"));
    assert!(!backend.nodes.contains_key("DB.FIN.SHARED_CAL"));
    assert!(ctl.is_expanded("margin__f_b"));
}

#[test]
fn test_extended_schema_cascades_into_tables() {
    let csv = "\
function_name,dataset_name,datapoint,table_name,column_name,downstream_table,downstream_column,transformation
f,sales,revenue,DB.FIN.REV,AMOUNT,RPT.SUMMARY,TOTAL,SUM(AMOUNT)
f,sales,revenue,DB.FIN.REV,CCY,,,
f,sales,revenue,DB.FIN.FX,RATE,RPT.SUMMARY,TOTAL,
";
    let rows: Vec<Row> = parse_csv(csv.as_bytes()).unwrap();
    let config = BuildConfig {
        schema: SchemaSource::Named("extended".to_string()),
        ..BuildConfig::default()
    };
    let doc = LineageDocument::build(&rows, "M", &config).unwrap();
    let mut ctl = doc.controller();
    let mut backend = MemoryBackend::new();
    ctl.mount(&mut backend);
    for id in ["f", "f_sales", "revenue__f"] {
        ctl.click(id, &mut backend);
    }

    assert!(!ctl.is_expanded("DB.FIN.REV"));
    assert_eq!(ctl.tick(&mut backend), 2);
    assert!(ctl.is_expanded("DB.FIN.REV") && ctl.is_expanded("DB.FIN.FX"));
    assert!(ctl.is_visible("AMOUNT") && ctl.is_visible("CCY") && ctl.is_visible("RATE"));
    assert!(!ctl.has_pending_cascades());

    ctl.click("AMOUNT", &mut backend);
    let edge = &backend.edges[&("AMOUNT".to_string(), "RPT.SUMMARY".to_string())];
    assert_eq!(edge.label.as_deref(), Some("SUM(AMOUNT)"));
    assert_eq!(backend.nodes["RPT.SUMMARY"].label, "Summary");

    // Collapsing the datapoint takes the cascaded tables and columns with it.
    ctl.click("revenue__f", &mut backend);
    assert_eq!(
        ctl.visible_nodes(),
        vec!["M", "f", "f_sales", "revenue__f"]
    );
    assert_eq!(backend.nodes.len(), 4);
}

#[test]
fn test_empty_input_renders_root_only() {
    let doc = LineageDocument::build(&[], "lonely_model", &BuildConfig::default()).unwrap();
    let mut ctl = doc.controller();
    let mut backend = MemoryBackend::new();
    ctl.mount(&mut backend);
    assert_eq!(ctl.visible_nodes(), vec!["lonely_model"]);
    assert_eq!(ctl.click("lonely_model", &mut backend), ClickOutcome::Ignored);

    let html = doc.render().unwrap();
    assert!(html.contains("lonely_model"));
}

#[test]
fn test_initial_graph_payload() {
    let doc = scenario_document(&BuildConfig::default());
    insta::assert_json_snapshot!(doc.payload.view.initial, @r###"
    {
      "nodes": [
        {
          "id": "M",
          "label": "M",
          "type": "model",
          "expandable": true,
          "auto_expand": false
        },
        {
          "id": "f_a",
          "label": "f_a",
          "type": "function",
          "expandable": true,
          "auto_expand": false
        },
        {
          "id": "f_b",
          "label": "f_b",
          "type": "function",
          "expandable": true,
          "auto_expand": false
        }
      ],
      "edges": [
        {
          "from": "M",
          "to": "f_a"
        },
        {
          "from": "M",
          "to": "f_b"
        }
      ]
    }
    "###);
    assert_eq!(doc.payload.view.initially_expanded, vec!["M".to_string()]);
}
