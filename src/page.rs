//! HTML rendering for the form-based UI.

use crate::game::GameStatus;

/// Severity of a message shown above the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Something went wrong and nothing changed, or play cannot continue.
    Error,
    /// Play continued, but something was degraded.
    Warning,
    /// Plain information.
    Info,
}

impl NoticeKind {
    fn css_class(self) -> &'static str {
        match self {
            NoticeKind::Error => "notice error",
            NoticeKind::Warning => "notice warning",
            NoticeKind::Info => "notice info",
        }
    }
}

/// A message shown above the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub kind: NoticeKind,
    /// Message text (unescaped).
    pub text: String,
}

impl Notice {
    /// Creates an error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    /// Creates a warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            text: text.into(),
        }
    }

    /// Creates an info notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }
}

/// Everything the game page shows.
#[derive(Debug, Clone)]
pub struct GameView {
    /// Board drawn as text.
    pub board: String,
    /// Legal moves for the select control.
    pub legal_moves: Vec<String>,
    /// Latest commentary.
    pub commentary: String,
    /// Game status.
    pub status: GameStatus,
    /// Messages above the board.
    pub notices: Vec<Notice>,
}

const STYLE: &str = "body{font-family:sans-serif;max-width:40em;margin:2em auto;padding:0 1em}\
pre.board{font-size:1.4em;line-height:1.3em;background:#f4f1ea;padding:.6em}\
pre.commentary{white-space:pre-wrap;font-family:inherit}\
.notice{padding:.5em;margin:.5em 0;border-radius:4px}\
.error{background:#fbe3e3}.warning{background:#fff4d6}.info{background:#e3f0fb}\
form{display:inline-block;margin-right:1em}";

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>DadBot: Your Father's Day Chess Buddy</title><style>{STYLE}</style></head>\
         <body><h1>♟️ DadBot: Your Father's Day Chess Buddy</h1>\
         <p>Happy Father's Day! Play chess against the engine and enjoy DadBot's commentary along the way.</p>\
         {body}</body></html>"
    )
}

/// Renders the main game page.
pub fn render_game(view: &GameView) -> String {
    let mut body = String::new();

    for notice in &view.notices {
        body.push_str(&format!(
            "<div class=\"{}\">{}</div>",
            notice.kind.css_class(),
            escape_html(&notice.text)
        ));
    }

    body.push_str(&format!("<pre class=\"board\">{}</pre>", escape_html(&view.board)));

    if view.status.is_over() {
        body.push_str(&format!("<p><strong>{}</strong></p>", escape_html(&view.status.to_string())));
    } else {
        let options: String = view
            .legal_moves
            .iter()
            .map(|m| {
                let m = escape_html(m);
                format!("<option value=\"{m}\">{m}</option>")
            })
            .collect();
        body.push_str(&format!(
            "<form method=\"post\" action=\"/move\"><label for=\"mv\">Your move:</label> \
             <select id=\"mv\" name=\"mv\">{options}</select> \
             <button type=\"submit\">Make Move</button></form>"
        ));
    }

    body.push_str(
        "<form method=\"post\" action=\"/restart\"><button type=\"submit\">🔄 Restart Game</button></form>\
         <form method=\"post\" action=\"/end\"><button type=\"submit\">End Session</button></form>",
    );

    if !view.commentary.is_empty() {
        body.push_str(&format!(
            "<pre class=\"commentary\">{}</pre>",
            escape_html(&view.commentary)
        ));
    }

    layout(&body)
}

/// Page shown after a session ends.
pub fn render_goodbye() -> String {
    layout("<p>Thanks for playing! DadBot is proud of you.</p><p><a href=\"/\">Start a new game</a></p>")
}

/// Page shown when play cannot start or continue.
pub fn render_fatal(message: &str) -> String {
    layout(&format!(
        "<div class=\"notice error\">{}</div><p><a href=\"/\">Try again</a></p>",
        escape_html(message)
    ))
}

/// Escapes text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
