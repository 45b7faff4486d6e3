// End-to-end extraction against a mocked Ollama server.

use std::time::Duration;

use httpmock::prelude::*;
use rekap_ai::{ExtractionError, Extractor, Normalizer, OllamaOracle, OracleError};
use rekap_core::ValidationMode;
use serde_json::json;

fn ollama_answer(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3.2",
        "created_at": "2026-01-05T10:00:00Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

fn extractor(server: &MockServer, mode: ValidationMode) -> Extractor<OllamaOracle> {
    let oracle = OllamaOracle::new(server.base_url(), "llama3.2", Duration::from_secs(5)).unwrap();
    Extractor::new(oracle, Normalizer::new(mode))
}

#[test]
fn extracts_scattered_entities_into_records() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(ollama_answer(
            r#"{"data": [{"nama": "Putri", "nim": "105", "nilai": 88, "keterangan": "UTS"}]}"#,
        ));
    });

    let extraction = extractor(&server, ValidationMode::Strict)
        .extract("Mahasiswi bernama Putri dengan NIM 105 mendapat nilai 88 untuk UTS")
        .unwrap();

    mock.assert();
    assert_eq!(extraction.records.len(), 1);
    let record = &extraction.records[0];
    assert_eq!(record.id, "105");
    assert_eq!(record.name.as_deref(), Some("Putri"));
    assert_eq!(record.score, Some(88.0));
    assert_eq!(record.remark, "UTS");
}

#[test]
fn hallucinated_example_is_filtered() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(ollama_answer(
            r#"{"data": [{"nama": "Nama Lengkap", "nim": "String Nomor", "nilai": 0}]}"#,
        ));
    });

    let extraction = extractor(&server, ValidationMode::Strict)
        .extract("tidak ada data mahasiswa di sini")
        .unwrap();

    assert!(extraction.is_empty());
    assert_eq!(extraction.rejected, 1);
}

#[test]
fn unreachable_model_is_an_oracle_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(500).body("model runner crashed");
    });

    let err = extractor(&server, ValidationMode::Strict)
        .extract("Putri 105 nilai 88")
        .unwrap_err();

    match err {
        ExtractionError::Oracle(OracleError::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "model runner crashed");
        }
        other => panic!("expected oracle error, got {other:?}"),
    }
}

#[test]
fn scalar_answer_is_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(ollama_answer("42"));
    });

    let err = extractor(&server, ValidationMode::Lenient).extract("Putri 105").unwrap_err();
    assert!(matches!(err, ExtractionError::UnrecognizedShape(_)));
}
