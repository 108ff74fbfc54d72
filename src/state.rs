/// 会话状态机
///
/// `Closed` 和 `Errored` 是终态；重新开始会创建一个新的会话实例。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Errored,
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }

    pub fn is_connected(self) -> bool {
        self == SessionState::Open
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "OFFLINE",
            SessionState::Connecting => "CONNECTING",
            SessionState::Open => "LIVE",
            SessionState::Errored => "ERROR",
            SessionState::Closed => "CLOSED",
        }
    }
}
