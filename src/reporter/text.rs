use crate::core::result_manager::ResultManager;
use crate::domain::model::TestResult;

/// `<device> :: <test> :: <STATUS>(<messages>)`
pub fn format_result(result: &TestResult) -> String {
    let messages = if result.messages.is_empty() {
        String::new()
    } else {
        format!("({})", result.messages.join(", "))
    };
    format!(
        "{} :: {} :: {}{}",
        result.name,
        result.test,
        result.result.as_str().to_uppercase(),
        messages
    )
}

pub fn report_text(manager: &ResultManager) -> String {
    manager
        .results()
        .iter()
        .map(format_result)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures;

    #[test]
    fn test_text_report() {
        let report = report_text(&fixtures::manager());
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "leaf1 :: VerifyUptime :: SUCCESS");
        assert_eq!(
            lines[1],
            "leaf1 :: VerifyBGPPeerSession :: FAILURE(Peer: 10.0.0.1 VRF: default - Not found)"
        );
    }
}
