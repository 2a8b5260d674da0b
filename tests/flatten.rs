use serde_json::json;

use flowcell_parser::diagnostics::{CollectingSink, Severity};
use flowcell_parser::flatten::flatten_str;
use flowcell_parser::node::Node;
use flowcell_parser::run_info::RunInfo;

const RUN_INFO: &str = r#"<?xml version="1.0"?>
<RunInfo xmlns:xsd="http://www.w3.org/2001/XMLSchema" Version="2">
  <Run Id="150424_ST-E00214_0031_BH2WY7CCXX" Number="31">
    <Flowcell>H2WY7CCXX</Flowcell>
    <Instrument>ST-E00214</Instrument>
    <Date>150424</Date>
    <Reads>
      <Read Number="1" NumCycles="151" IsIndexedRead="N" />
      <Read Number="2" NumCycles="8" IsIndexedRead="Y" />
      <Read Number="3" NumCycles="151" IsIndexedRead="N" />
    </Reads>
    <FlowcellLayout LaneCount="8" SurfaceCount="2" SwathCount="2" TileCount="24" />
    <AlignToPhiX />
  </Run>
</RunInfo>
"#;

#[test]
fn flattens_run_info_document() {
    let node = flatten_str(RUN_INFO, "RunInfo.xml").unwrap();
    assert_eq!(
        node.into_value(),
        json!({
            "RunInfo": {
                "Version": "2",
                "Run": {
                    "Id": "150424_ST-E00214_0031_BH2WY7CCXX",
                    "Number": "31",
                    "Flowcell": "H2WY7CCXX",
                    "Instrument": "ST-E00214",
                    "Date": "150424",
                    "Reads": {
                        "Read": [
                            {"Number": "1", "NumCycles": "151", "IsIndexedRead": "N"},
                            {"Number": "2", "NumCycles": "8", "IsIndexedRead": "Y"},
                            {"Number": "3", "NumCycles": "151", "IsIndexedRead": "N"}
                        ]
                    },
                    "FlowcellLayout": {
                        "LaneCount": "8",
                        "SurfaceCount": "2",
                        "SwathCount": "2",
                        "TileCount": "24"
                    },
                    "AlignToPhiX": null
                }
            }
        })
    );
}

#[test]
fn repeated_children_keep_document_order() {
    let node = flatten_str(
        "<Lanes><Lane>3</Lane><Other/><Lane>1</Lane><Lane>2</Lane></Lanes>",
        "test",
    )
    .unwrap();
    let lanes = node.path(&["Lanes", "Lane"]).unwrap();
    assert_eq!(
        lanes.as_list().unwrap(),
        &[Node::scalar("3"), Node::scalar("1"), Node::scalar("2")]
    );
}

#[test]
fn single_child_is_not_wrapped_in_list() {
    let node = flatten_str("<Reads><Read Number=\"1\"/></Reads>", "test").unwrap();
    let read = node.path(&["Reads", "Read"]).unwrap();
    assert!(read.as_list().is_none());
    assert_eq!(read.get("Number"), Some(&Node::scalar("1")));
    assert_eq!(read.as_items().len(), 1);
}

#[test]
fn attributes_and_text_share_one_mapping() {
    let node = flatten_str(r#"<ScannerID kind="hiseq">M0001</ScannerID>"#, "test").unwrap();
    assert_eq!(
        node.into_value(),
        json!({"ScannerID": {"kind": "hiseq", "text": "M0001"}})
    );
}

#[test]
fn run_info_derives_recipe_and_lists_reads() {
    let sink = CollectingSink::new();
    let info = RunInfo::parse(RUN_INFO, "RunInfo.xml", &sink).unwrap();
    assert_eq!(info.recipe.as_deref(), Some("2x151"));
    assert_eq!(info.flowcell(), Some("H2WY7CCXX"));
    assert_eq!(info.reads().len(), 3);
    assert!(sink.warnings().is_empty());
}

#[test]
fn run_info_with_single_read_is_promoted_to_list() {
    let xml = r#"<RunInfo><Run Id="x"><Reads><Read Number="1" NumCycles="51" IsIndexedRead="N"/></Reads></Run></RunInfo>"#;
    let info = RunInfo::parse(xml, "RunInfo.xml", &CollectingSink::new()).unwrap();
    assert_eq!(info.recipe.as_deref(), Some("1x51"));
    assert!(info.data.get("Reads").unwrap().as_list().is_some());
}

#[test]
fn inconsistent_cycles_warn_and_keep_first_value() {
    let xml = r#"<RunInfo><Run Id="x"><Reads>
        <Read Number="1" NumCycles="151" IsIndexedRead="N"/>
        <Read Number="2" NumCycles="76" IsIndexedRead="N"/>
    </Reads></Run></RunInfo>"#;
    let sink = CollectingSink::new();
    let info = RunInfo::parse(xml, "RunInfo.xml", &sink).unwrap();
    assert_eq!(info.recipe.as_deref(), Some("2x151"));

    let warnings = sink.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(warnings[0].component, "run_info");
}

#[test]
fn run_info_without_run_element_is_format_error() {
    let err = RunInfo::parse("<RunInfo/>", "RunInfo.xml", &CollectingSink::new()).unwrap_err();
    assert!(matches!(
        err,
        flowcell_parser::error::FlowcellError::Format { .. }
    ));
}
