//! 通用工具函数

use chrono::Utc;
use uuid::Uuid;

/// 生成平台内部病例编号，形如 TMC-20240603-1a2b3c4d
pub fn generate_case_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TMC-{}-{}", Utc::now().format("%Y%m%d"), &suffix[..8])
}

/// 验证病例编号格式
pub fn is_valid_case_number(number: &str) -> bool {
    let parts: Vec<&str> = number.split('-').collect();
    if parts.len() != 3 {
        return false;
    }
    parts[0] == "TMC"
        && parts[1].len() == 8
        && parts[1].chars().all(|c| c.is_ascii_digit())
        && parts[2].len() == 8
        && parts[2].chars().all(|c| c.is_ascii_hexdigit())
}

/// 验证会议链接格式
pub fn is_valid_meeting_link(link: &str) -> bool {
    link.starts_with("https://") || link.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_case_number() {
        let number = generate_case_number();
        assert!(is_valid_case_number(&number));
    }

    #[test]
    fn test_is_valid_case_number() {
        assert!(is_valid_case_number("TMC-20240603-1a2b3c4d"));
        assert!(!is_valid_case_number(""));
        assert!(!is_valid_case_number("TMC-2024-xy"));
        assert!(!is_valid_case_number("ABC-20240603-1a2b3c4d"));
    }

    #[test]
    fn test_is_valid_meeting_link() {
        assert!(is_valid_meeting_link("https://meet.example.com/room/42"));
        assert!(is_valid_meeting_link("http://meet.example.com/room/42"));
        assert!(!is_valid_meeting_link("meet.example.com/room/42"));
        assert!(!is_valid_meeting_link(""));
    }
}
