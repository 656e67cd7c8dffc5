use time::OffsetDateTime;

/// Build a record id of the form `{prefix}_{yyyyMMddHHmmssSSS}` (UTC,
/// millisecond precision).
///
/// Ids are distinguishable within one process under normal clock resolution;
/// two calls landing in the same millisecond produce the same id. That is a
/// documented weakness of the scheme, not a uniqueness guarantee.
pub fn record_id(prefix: &str) -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{}_{:04}{:02}{:02}{:02}{:02}{:02}{:03}",
        prefix,
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_prefix_and_timestamp() {
        let id = record_id("monitor");
        let (prefix, ts) = id.split_once('_').expect("id must contain a separator");
        assert_eq!(prefix, "monitor");
        assert_eq!(ts.len(), 17);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn prefix_is_preserved_verbatim() {
        assert!(record_id("peak").starts_with("peak_"));
        assert!(record_id("meter").starts_with("meter_"));
    }
}
