/// Strips every trailing `/`, so `gs://bucket//` and `gs://bucket` name the same bucket.
pub fn remove_trailling_slash(string: &str) -> String {
    string.trim_end_matches('/').to_string()
}
