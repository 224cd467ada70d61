use serde::Deserialize;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 500;

/// Reason a submitted form was rejected, shown to the user as-is.
pub type Invalid = &'static str;

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub color: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), Invalid> {
        require(self.username(), "Username is required")?;
        bounded(self.username(), MAX_USERNAME_LEN, "Username is too long")?;
        require(&self.password, "Password is required")?;
        hex_color(&self.color)
    }

    /// The name as stored: surrounding whitespace is not part of it.
    pub fn username(&self) -> &str {
        self.username.trim()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn username(&self) -> &str {
        self.username.trim()
    }
}

// -- Posts --

#[derive(Debug, Deserialize)]
pub struct PostForm {
    pub title: String,
    pub content: String,
}

impl PostForm {
    pub fn validate(&self) -> Result<(), Invalid> {
        require(&self.title, "Title is required")?;
        bounded(&self.title, MAX_TITLE_LEN, "Title is too long")?;
        require(&self.content, "Content is required")?;
        Ok(())
    }
}

// -- Comments --

/// New comment or reply. Browsers submit an empty `parent_id` for top-level
/// comments, so blank is treated the same as absent.
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl CommentForm {
    pub fn validate(&self) -> Result<(), Invalid> {
        require(&self.content, "Comment cannot be empty")
    }

    pub fn parent_id(&self) -> Result<Option<i64>, Invalid> {
        match self.parent_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| "Malformed parent comment id"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditCommentForm {
    pub content: String,
}

impl EditCommentForm {
    pub fn validate(&self) -> Result<(), Invalid> {
        require(&self.content, "Comment cannot be empty")
    }
}

// -- Chat --

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    pub content: String,
}

impl MessageForm {
    pub fn validate(&self) -> Result<(), Invalid> {
        require(&self.content, "Message cannot be empty")?;
        bounded(&self.content, MAX_MESSAGE_LEN, "Message is too long")
    }
}

fn require(value: &str, reason: Invalid) -> Result<(), Invalid> {
    if value.trim().is_empty() { Err(reason) } else { Ok(()) }
}

/// Colors end up inside a `style` attribute, so only `#rrggbb` is accepted.
fn hex_color(value: &str) -> Result<(), Invalid> {
    let digits = value.strip_prefix('#').unwrap_or_default();
    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err("Color must look like #rrggbb")
    }
}

fn bounded(value: &str, max_chars: usize, reason: Invalid) -> Result<(), Invalid> {
    if value.chars().count() > max_chars { Err(reason) } else { Ok(()) }
}
