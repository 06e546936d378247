//! Fixed command vocabulary. Matching is exact after trim and lowercase.

const TOTALS: &[&str] = &[
    "show today's totals",
    "today's totals",
    "totals",
    "today",
    "今日の合計",
    "今日の合計を教えて",
    "合計",
];
const GOALS: &[&str] = &["show goals", "goals", "my goals", "mygoal", "目標", "目標値"];
const PROFILE: &[&str] = &["show profile", "profile", "登録情報", "プロフィール"];
const RESET: &[&str] = &["reset", "リセット", "初期化"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShowTotals,
    ShowGoals,
    ShowProfile,
    Reset,
}

impl Command {
    /// Match `text` against the vocabulary, or `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().to_lowercase();
        let key = normalized.as_str();
        if TOTALS.contains(&key) {
            Some(Self::ShowTotals)
        } else if GOALS.contains(&key) {
            Some(Self::ShowGoals)
        } else if PROFILE.contains(&key) {
            Some(Self::ShowProfile)
        } else if RESET.contains(&key) {
            Some(Self::Reset)
        } else {
            None
        }
    }
}
