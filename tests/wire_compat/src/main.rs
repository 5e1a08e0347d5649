fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use bigfile_protocol::constants::RESULT_INCOMPLETE;
    use bigfile_protocol::{
        CheckParams, CheckResponse, CheckStatus, JsonResult, MergeParams, MergeResponse,
        UploadResponse,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_check_statuses() {
        let absent: JsonResult<CheckResponse> = roundtrip_test("check_absent.json");
        assert_eq!(absent.result_data, Some(CheckResponse::absent()));

        let complete: JsonResult<CheckResponse> = roundtrip_test("check_complete.json");
        assert_eq!(complete.result_data, Some(CheckResponse::complete()));

        let partial: JsonResult<CheckResponse> = roundtrip_test("check_partial.json");
        let data = partial.into_result().unwrap().unwrap();
        assert_eq!(data.status, CheckStatus::PartiallyStored);
        assert_eq!(data.data, vec![0, 1, 5]);
    }

    #[test]
    fn fixture_upload_response() {
        let resp: JsonResult<UploadResponse> = roundtrip_test("upload_ok.json");
        assert_eq!(resp.into_result().unwrap().unwrap().uploaded_chunk_count, 2);
    }

    #[test]
    fn fixture_merge_response() {
        let resp: JsonResult<MergeResponse> = roundtrip_test("merge_ok.json");
        assert_eq!(
            resp.into_result().unwrap(),
            Some(MergeResponse {
                size: 5,
                chunk_count: 3
            })
        );
    }

    #[test]
    fn fixture_error_envelope() {
        let resp: JsonResult<MergeResponse> = roundtrip_test("merge_incomplete.json");
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, RESULT_INCOMPLETE);
        assert!(err.message.contains("missing [1]"));
    }

    #[test]
    fn fixture_request_params() {
        let check: CheckParams = roundtrip_test("check_params.json");
        assert_eq!(check.file_md5, "2ecdde3959051d913f61b14579ea136d");

        let merge: MergeParams = roundtrip_test("merge_params.json");
        assert_eq!(merge.chunks, Some(3));
        assert_eq!(merge.file_name, "abcde.txt");
    }

    #[test]
    fn merge_params_without_total() {
        let merge: MergeParams = serde_json::from_value(serde_json::json!({
            "fileName": "a.bin",
            "fileMd5": "2ecdde3959051d913f61b14579ea136d"
        }))
        .unwrap();
        assert_eq!(merge.chunks, None);
        assert!(serde_json::to_value(&merge).unwrap().get("chunks").is_none());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = serde_json::from_value::<CheckResponse>(serde_json::json!({
            "status": 7,
            "data": []
        }));
        assert!(result.is_err());
    }
}
