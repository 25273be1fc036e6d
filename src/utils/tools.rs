use serde_json::Value;

/// 以點號路徑取得巢狀 JSON 欄位，例如 `get_value(&output, "vrfs.default.totalRoutes")`
///
/// `separator` 用於 key 本身含有 `.` 的情況（例如介面名稱或 IP 位址）。
pub fn get_value_with_separator<'a>(data: &'a Value, key: &str, separator: char) -> Option<&'a Value> {
    key.split(separator).try_fold(data, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

pub fn get_value<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    get_value_with_separator(data, key, '.')
}

/// 取第一筆符合 `key == value` 的物件
pub fn get_item<'a>(items: &'a [Value], key: &str, value: &Value) -> Option<&'a Value> {
    items.iter().find(|item| item.get(key) == Some(value))
}

/// 把 JSON 純量轉成訊息中的寫法（字串不加引號）
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
