use pretty_assertions::assert_eq;
use studio_core::{map_rows, parse_delimited, ColumnMap};

const HEADER: &str = "Name,Brief,c2,c3,c4,c5,c6,c7,c8,c9,c10,Prompt,c12,c13,c14,Ref1,Ref2,Ref3,Ref4,Ref5";

fn sheet(rows: &[&str]) -> String {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text
}

fn row_with(name: &str, brief: &str, prompt: &str, refs: [&str; 5]) -> String {
    let mut cells = vec![String::new(); 20];
    cells[0] = name.to_string();
    cells[1] = brief.to_string();
    cells[11] = prompt.to_string();
    for (offset, value) in refs.iter().enumerate() {
        cells[15 + offset] = value.to_string();
    }
    cells.join(",")
}

#[test]
fn header_is_discarded_and_empty_names_skipped() {
    let text = sheet(&[
        &row_with("Lobby", "", "", [""; 5]),
        &row_with("", "orphan brief", "", [""; 5]),
        &row_with("   ", "", "", [""; 5]),
        &row_with("Kitchen", "", "", [""; 5]),
    ]);
    let mapped = map_rows(&parse_delimited(&text), &ColumnMap::default());
    let names: Vec<_> = mapped.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["Lobby", "Kitchen"]);
}

#[test]
fn prompt_falls_back_to_brief_column() {
    let text = sheet(&[
        &row_with("A", "brief a", "prompt a", [""; 5]),
        &row_with("B", "brief b", "", [""; 5]),
        &row_with("C", "", "", [""; 5]),
    ]);
    let mapped = map_rows(&parse_delimited(&text), &ColumnMap::default());
    let prompts: Vec<_> = mapped.iter().map(|row| row.custom_prompt.clone()).collect();
    assert_eq!(
        prompts,
        vec![Some("prompt a".to_string()), Some("brief b".to_string()), None]
    );
}

#[test]
fn reference_slots_keep_column_positions() {
    let text = sheet(&[&row_with(
        "Lobby",
        "",
        "",
        ["", "https://cdn.example.com/2.png", "not a url", "", "http://x.example/5.jpg"],
    )]);
    let mapped = map_rows(&parse_delimited(&text), &ColumnMap::default());
    let slots: Vec<_> = mapped[0]
        .reference_urls
        .iter()
        .map(|url| url.as_ref().map(|u| u.as_str().to_string()))
        .collect();
    assert_eq!(
        slots,
        vec![
            None,
            Some("https://cdn.example.com/2.png".to_string()),
            None,
            None,
            Some("http://x.example/5.jpg".to_string()),
        ]
    );
}

#[test]
fn short_rows_read_missing_cells_as_empty() {
    let text = sheet(&["Lobby,make it brighter"]);
    let mapped = map_rows(&parse_delimited(&text), &ColumnMap::default());
    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0].custom_prompt.as_deref(), Some("make it brighter"));
    assert_eq!(mapped[0].reference_urls.len(), 5);
    assert!(mapped[0].reference_urls.iter().all(Option::is_none));
}

#[test]
fn custom_column_map_is_honoured() {
    let columns = ColumnMap {
        name: 1,
        prompt: 2,
        prompt_fallback: 2,
        references: [3, 4, 5, 6, 7],
    };
    let text = "id,name,prompt,r1\n7,\"Suite, North\",warm tones,https://a.example/r.png\n";
    let mapped = map_rows(&parse_delimited(text), &columns);
    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0].name, "Suite, North");
    assert_eq!(mapped[0].custom_prompt.as_deref(), Some("warm tones"));
    assert!(mapped[0].reference_urls[0].is_some());
}
