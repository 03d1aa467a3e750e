use rustiec_core::apci::Apci;
use rustiec_core::asdu::{Asdu, AsduParams};
use rustiec_core::encoding::reader::Reader;
use std::fs;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root should be resolvable")
}

fn parse_hex_fixture(path: &Path) -> Vec<u8> {
    let content = fs::read_to_string(path).expect("fixture must be readable");
    let mut out = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for token in trimmed.split_whitespace() {
            let byte = u8::from_str_radix(token, 16)
                .unwrap_or_else(|_| panic!("invalid hex token '{token}' in {}", path.display()));
            out.push(byte);
        }
    }
    out
}

#[test]
fn golden_corpus_fixtures_decode_apci_and_asdu() {
    let fixture_dir = workspace_root().join("fixtures/golden");
    let mut fixture_files = fs::read_dir(&fixture_dir)
        .expect("fixtures directory should exist")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "hex"))
        .collect::<Vec<_>>();
    fixture_files.sort();
    assert!(
        !fixture_files.is_empty(),
        "expected at least one corpus fixture in {}",
        fixture_dir.display()
    );

    for fixture in fixture_files {
        let bytes = parse_hex_fixture(&fixture);
        let mut r = Reader::new(&bytes);
        let (apci, asdu) = Apci::decode(&mut r).unwrap_or_else(|e| {
            panic!(
                "fixture {} failed APCI decode with error {e:?}",
                fixture.display()
            )
        });
        assert!(
            r.is_empty(),
            "fixture {} has bytes after the frame",
            fixture.display()
        );

        if let Apci::I { .. } = apci {
            let mut ar = Reader::new(asdu);
            let decoded = Asdu::decode(&mut ar, &AsduParams::IEC104).unwrap_or_else(|e| {
                panic!(
                    "fixture {} failed ASDU decode with error {e:?}",
                    fixture.display()
                )
            });
            assert!(
                decoded.element_count() > 0,
                "fixture {} carries no elements",
                fixture.display()
            );
        }
    }
}
