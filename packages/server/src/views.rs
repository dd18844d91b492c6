//! Server-rendered pages.
//!
//! Template structs that bind to the askama files under `templates/`. Every
//! interpolated value is HTML-escaped by askama.

use crate::models::{Comment, Feedback, FEEDBACK_COMMENT_MAX};
use crate::Result;
use askama::Template;
use axum::response::Html;

/// Landing page: live taxi position, feedback and comments with their forms.
#[derive(Template, Debug)]
#[template(path = "index.html")]
pub struct LandingTemplate<'a> {
    pub feedback: &'a [Feedback],
    pub comments: &'a [Comment],
    /// Client-side limit on the feedback comment box.
    pub comment_max: usize,
}

impl<'a> LandingTemplate<'a> {
    pub fn new(feedback: &'a [Feedback], comments: &'a [Comment]) -> Self {
        Self {
            feedback,
            comments,
            comment_max: FEEDBACK_COMMENT_MAX,
        }
    }
}

#[derive(Template, Debug)]
#[template(path = "comments.html")]
pub struct CommentsTemplate<'a> {
    pub comments: &'a [Comment],
}

#[derive(Template, Debug)]
#[template(path = "booking.html")]
pub struct BookingTemplate;

#[derive(Template, Debug)]
#[template(path = "about.html")]
pub struct AboutTemplate;

#[derive(Template, Debug)]
#[template(path = "contact.html")]
pub struct ContactTemplate;

pub fn render<T: Template>(template: &T) -> Result<Html<String>> {
    Ok(Html(template.render()?))
}
