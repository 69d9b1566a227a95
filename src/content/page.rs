//! What the content surface can read from the page it is attached to.

/// A box in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

/// Where the prompt is drawn, in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    /// Just below the end of a selection's bounding box.
    #[must_use]
    pub fn below(bounds: &Rect) -> Self {
        Self {
            x: bounds.left,
            y: bounds.bottom,
        }
    }
}

/// The user's current selection, untrimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSelection {
    pub text: String,
    pub bounds: Rect,
}

pub trait Page: Send {
    /// Current selection, if any.
    fn selection(&self) -> Option<PageSelection>;
    fn url(&self) -> String;
    fn title(&self) -> String;
    /// Visible text of the whole page.
    fn body_text(&self) -> String;
}

/// A page whose selection is set directly. Used by one-shot runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
    pub url: String,
    pub title: String,
    pub body: String,
    pub selection: Option<PageSelection>,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            body: body.into(),
            selection: None,
        }
    }

    /// Select `text` at an arbitrary position.
    pub fn select(&mut self, text: impl Into<String>) {
        self.selection = Some(PageSelection {
            text: text.into(),
            bounds: Rect {
                top: 10.0,
                left: 20.0,
                bottom: 30.0,
                right: 120.0,
            },
        });
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }
}

impl Page for StaticPage {
    fn selection(&self) -> Option<PageSelection> {
        self.selection.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn body_text(&self) -> String {
        self.body.clone()
    }
}
