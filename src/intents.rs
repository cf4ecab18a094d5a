//! Intents for picking and capturing images
//!
//! Intents are plain data here: an action, an optional MIME type and data URI, and
//! named extras. Dispatching them is left to the host.

use std::collections::BTreeMap;
use std::path::Path;

use crate::Result;
use crate::content::ContentUri;
use crate::files;

/// Pick existing content
pub const ACTION_GET_CONTENT: &str = "android.intent.action.GET_CONTENT";
/// Let the user choose between several intents
pub const ACTION_CHOOSER: &str = "android.intent.action.CHOOSER";
/// Capture a photo with the camera
pub const ACTION_IMAGE_CAPTURE: &str = "android.media.action.IMAGE_CAPTURE";
/// Ask the media scanner to index a file
pub const ACTION_MEDIA_SCANNER_SCAN_FILE: &str = "android.intent.action.MEDIA_SCANNER_SCAN_FILE";

/// Where a capture intent writes its output
pub const EXTRA_OUTPUT: &str = "output";
/// Intent wrapped by a chooser
pub const EXTRA_INTENT: &str = "android.intent.extra.INTENT";
/// Chooser title
pub const EXTRA_TITLE: &str = "android.intent.extra.TITLE";
/// Intents a chooser offers before its wrapped intent
pub const EXTRA_INITIAL_INTENTS: &str = "android.intent.extra.INITIAL_INTENTS";

/// Value stored under an intent extra
#[derive(Debug, Clone, PartialEq)]
pub enum Extra {
    /// Text value
    Text(String),
    /// URI value
    Uri(ContentUri),
    /// Nested intent
    Intent(Box<Intent>),
    /// List of intents
    Intents(Vec<Intent>),
}

/// Description of an operation to be performed by another component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    action: Option<String>,
    mime_type: Option<String>,
    data: Option<ContentUri>,
    extras: BTreeMap<String, Extra>,
}

impl Intent {
    /// Create an intent for `action`
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// Wrap `target` in a chooser titled `title`
    pub fn chooser(target: Intent, title: impl Into<String>) -> Self {
        let mut chooser = Intent::new(ACTION_CHOOSER);
        chooser.put_extra(EXTRA_INTENT, Extra::Intent(Box::new(target)));
        chooser.put_extra(EXTRA_TITLE, Extra::Text(title.into()));
        chooser
    }

    /// Set the MIME type
    pub fn with_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the data URI
    pub fn with_data(mut self, uri: ContentUri) -> Self {
        self.data = Some(uri);
        self
    }

    /// Store an extra, replacing any previous value under `name`
    pub fn put_extra(&mut self, name: impl Into<String>, value: Extra) {
        self.extras.insert(name.into(), value);
    }

    /// Action
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// MIME type
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Data URI
    pub fn data(&self) -> Option<&ContentUri> {
        self.data.as_ref()
    }

    /// Extra stored under `name`
    pub fn extra(&self, name: &str) -> Option<&Extra> {
        self.extras.get(name)
    }
}

/// Chooser offering the image gallery and, when `camera_dir` is given, the camera.
///
/// The camera writes to a new uniquely named `.jpg` in `camera_dir`, whose URI is
/// returned alongside the chooser so the caller can pick the photo up afterwards.
pub fn camera_and_gallery_chooser(
    title: &str,
    camera_dir: Option<&Path>,
) -> Result<(Intent, Option<ContentUri>)> {
    let gallery = Intent::new(ACTION_GET_CONTENT).with_type("image/*");
    let mut chooser = Intent::chooser(gallery, title);

    let Some(dir) = camera_dir else {
        return Ok((chooser, None));
    };

    let output = ContentUri::from_file_path(dir.join(files::new_unique_file_name_for_camera()))?;
    let mut camera = Intent::new(ACTION_IMAGE_CAPTURE);
    camera.put_extra(EXTRA_OUTPUT, Extra::Uri(output.clone()));
    chooser.put_extra(EXTRA_INITIAL_INTENTS, Extra::Intents(vec![camera]));

    tracing::debug!(output = %output, "camera offered in image chooser");
    Ok((chooser, Some(output)))
}

/// Whether an activity result came from the camera.
///
/// The camera may hand back no intent at all, so a missing intent counts as a camera
/// result.
pub fn is_activity_result_from_camera(data: Option<&Intent>) -> bool {
    match data {
        None => true,
        Some(intent) => intent.action() == Some(ACTION_IMAGE_CAPTURE),
    }
}

/// Intent telling the media index about a newly written file
pub fn media_scanner_scan_file(uri: ContentUri) -> Intent {
    Intent::new(ACTION_MEDIA_SCANNER_SCAN_FILE).with_data(uri)
}
