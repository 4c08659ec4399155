//! Message catalogue.
//!
//! [`Request`] covers every message a controller may send and [`Response`]
//! every message the host emits. Both convert to and from [`Envelope`]s.

use serde::{Deserialize, Serialize};

use crate::envelope::{DecodeError, EncodeError, Envelope, base64_bytes};
use crate::model::{ActionContextOption, AppInfo, Executor, Page};

/// Reported when a frame names an unknown or non-request message type.
pub const UNSUPPORTED_MESSAGE_TYPE: &str = "Unsupported message type";
/// Reported when a frame or its payload cannot be decoded.
pub const INVALID_MESSAGE_FORMAT: &str = "Invalid message format";

/// Every tag understood on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `listPages` request.
    ListPages,
    /// `pagesList` response.
    PagesList,
    /// `listApps` request.
    ListApps,
    /// `appsList` response.
    AppsList,
    /// `listShortcuts` request.
    ListShortcuts,
    /// `shortcutsList` response.
    ShortcutsList,
    /// `getAppIcon` request.
    GetAppIcon,
    /// `appIconData` response.
    AppIconData,
    /// `createPage` request.
    CreatePage,
    /// `modifyPage` request.
    ModifyPage,
    /// `deletePage` request.
    DeletePage,
    /// `pageUpdated` response.
    PageUpdated,
    /// `updateAppInfo` request.
    UpdateAppInfo,
    /// `createExecutor` request.
    CreateExecutor,
    /// `updateExecutor` request.
    UpdateExecutor,
    /// `modifyExecutor` request, an alias of `updateExecutor`.
    ModifyExecutor,
    /// `deleteExecutor` request.
    DeleteExecutor,
    /// `executorUpdated` response.
    ExecutorUpdated,
    /// `executorDeleted` response.
    ExecutorDeleted,
    /// `swapExecutor` request.
    SwapExecutor,
    /// `executorSwapped` response.
    ExecutorSwapped,
    /// `executeAction` request.
    ExecuteAction,
    /// `actionExecuted` response.
    ActionExecuted,
    /// `focusedAppUpdated` broadcast.
    FocusedAppUpdated,
    /// `error` response.
    Error,
}

impl MessageType {
    /// Every tag, in catalogue order.
    pub const ALL: [Self; 25] = [
        Self::ListPages,
        Self::PagesList,
        Self::ListApps,
        Self::AppsList,
        Self::ListShortcuts,
        Self::ShortcutsList,
        Self::GetAppIcon,
        Self::AppIconData,
        Self::CreatePage,
        Self::ModifyPage,
        Self::DeletePage,
        Self::PageUpdated,
        Self::UpdateAppInfo,
        Self::CreateExecutor,
        Self::UpdateExecutor,
        Self::ModifyExecutor,
        Self::DeleteExecutor,
        Self::ExecutorUpdated,
        Self::ExecutorDeleted,
        Self::SwapExecutor,
        Self::ExecutorSwapped,
        Self::ExecuteAction,
        Self::ActionExecuted,
        Self::FocusedAppUpdated,
        Self::Error,
    ];

    /// Wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListPages => "listPages",
            Self::PagesList => "pagesList",
            Self::ListApps => "listApps",
            Self::AppsList => "appsList",
            Self::ListShortcuts => "listShortcuts",
            Self::ShortcutsList => "shortcutsList",
            Self::GetAppIcon => "getAppIcon",
            Self::AppIconData => "appIconData",
            Self::CreatePage => "createPage",
            Self::ModifyPage => "modifyPage",
            Self::DeletePage => "deletePage",
            Self::PageUpdated => "pageUpdated",
            Self::UpdateAppInfo => "updateAppInfo",
            Self::CreateExecutor => "createExecutor",
            Self::UpdateExecutor => "updateExecutor",
            Self::ModifyExecutor => "modifyExecutor",
            Self::DeleteExecutor => "deleteExecutor",
            Self::ExecutorUpdated => "executorUpdated",
            Self::ExecutorDeleted => "executorDeleted",
            Self::SwapExecutor => "swapExecutor",
            Self::ExecutorSwapped => "executorSwapped",
            Self::ExecuteAction => "executeAction",
            Self::ActionExecuted => "actionExecuted",
            Self::FocusedAppUpdated => "focusedAppUpdated",
            Self::Error => "error",
        }
    }

    /// Looks up a wire tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == tag)
    }

    /// Whether controllers may send this tag.
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            Self::ListPages
                | Self::ListApps
                | Self::ListShortcuts
                | Self::GetAppIcon
                | Self::CreatePage
                | Self::ModifyPage
                | Self::DeletePage
                | Self::UpdateAppInfo
                | Self::CreateExecutor
                | Self::UpdateExecutor
                | Self::ModifyExecutor
                | Self::DeleteExecutor
                | Self::SwapExecutor
                | Self::ExecuteAction
        )
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `getAppIcon`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAppIconRequest {
    /// Application whose icon is requested.
    #[serde(rename = "bundleID")]
    pub bundle_id: String,
}

/// Body of `createPage` and `modifyPage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page to create or the replacement for the page with the same id.
    pub page: Page,
}

/// Body of `deletePage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePageRequest {
    /// Page to remove.
    #[serde(rename = "pageID")]
    pub page_id: String,
}

/// Body of `updateAppInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAppInfoRequest {
    /// Replacement for the remembered app with the same bundle id.
    #[serde(rename = "appInfo")]
    pub app_info: AppInfo,
}

/// Body of `createExecutor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExecutorRequest {
    /// Executor to append.
    pub executor: Executor,
    /// Page receiving the executor.
    #[serde(rename = "pageID")]
    pub page_id: String,
}

/// Body of `updateExecutor` and `modifyExecutor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExecutorRequest {
    /// Replacement for the executor with the same id.
    pub executor: Executor,
}

/// Body of `deleteExecutor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteExecutorRequest {
    /// Executor to remove.
    #[serde(rename = "executorID")]
    pub executor_id: String,
}

/// Body of `swapExecutor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapExecutorRequest {
    /// Executor to move.
    #[serde(rename = "executorID")]
    pub executor_id: String,
    /// Destination page.
    #[serde(rename = "pageID")]
    pub page_id: String,
    /// Destination slot index.
    pub index: usize,
}

/// Body of `executeAction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteActionRequest {
    /// Executor whose action runs.
    #[serde(rename = "executorID")]
    pub executor_id: String,
    /// Context binding to resolve.
    #[serde(rename = "actionContextOption", default)]
    pub action_context_option: ActionContextOption,
}

/// Body of `pagesList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagesListResponse {
    /// Every page in order.
    pub pages: Vec<Page>,
}

/// Body of `appsList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppsListResponse {
    /// Remembered applications.
    #[serde(rename = "appInfos")]
    pub app_infos: Vec<AppInfo>,
}

/// Body of `shortcutsList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutsListResponse {
    /// Shortcut names available to `runShortcut` actions.
    pub shortcuts: Vec<String>,
}

/// Body of `appIconData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIconDataResponse {
    /// Application the icon belongs to.
    #[serde(rename = "bundleID")]
    pub bundle_id: String,
    /// Raster image bytes, base64 on the wire.
    #[serde(rename = "iconBytes", with = "base64_bytes")]
    pub icon_bytes: Vec<u8>,
}

/// Body of `pageUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUpdatedResponse {
    /// Page the request targeted.
    #[serde(rename = "pageID")]
    pub page_id: String,
    /// Whether the change was committed.
    pub success: bool,
    /// Failure reason.
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome body shared by every executor-targeted response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorOutcome {
    /// Executor the request targeted.
    #[serde(rename = "executorID")]
    pub executor_id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Failure reason.
    #[serde(default)]
    pub message: Option<String>,
}

impl ExecutorOutcome {
    /// Successful outcome for `executor_id`.
    pub fn succeeded(executor_id: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            success: true,
            message: None,
        }
    }

    /// Failed outcome for `executor_id` carrying `message`.
    pub fn failed(executor_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Body of `focusedAppUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedAppUpdate {
    /// Application now in the foreground.
    #[serde(rename = "appInfo")]
    pub app_info: AppInfo,
}

/// Body of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable reason.
    pub message: String,
}

/// A message sent by a controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Read every page.
    ListPages,
    /// Read remembered applications.
    ListApps,
    /// Read available shortcut names.
    ListShortcuts,
    /// Read an application icon.
    GetAppIcon(GetAppIconRequest),
    /// Append a page.
    CreatePage(PageRequest),
    /// Replace a page.
    ModifyPage(PageRequest),
    /// Remove a page.
    DeletePage(DeletePageRequest),
    /// Replace a remembered application.
    UpdateAppInfo(UpdateAppInfoRequest),
    /// Append an executor to a page.
    CreateExecutor(CreateExecutorRequest),
    /// Replace an executor in place.
    UpdateExecutor(UpdateExecutorRequest),
    /// Turn an executor's slot into a hole.
    DeleteExecutor(DeleteExecutorRequest),
    /// Move an executor to a slot.
    SwapExecutor(SwapExecutorRequest),
    /// Run an executor's resolved action.
    ExecuteAction(ExecuteActionRequest),
}

impl Request {
    /// Decodes a frame into a request.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the envelope, tag, or payload is invalid.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        Self::from_envelope(&Envelope::decode(frame)?)
    }

    /// Interprets an envelope as a request.
    ///
    /// Field-less requests ignore any payload. `modifyExecutor` decodes as
    /// [`Request::UpdateExecutor`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Unsupported`] for unknown or non-request tags
    /// and [`DecodeError::Payload`] for malformed bodies.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, DecodeError> {
        let Some(message_type) = envelope.known_type().filter(|tag| tag.is_request()) else {
            return Err(DecodeError::Unsupported(envelope.message_type.clone()));
        };
        let request = match message_type {
            MessageType::ListPages => Self::ListPages,
            MessageType::ListApps => Self::ListApps,
            MessageType::ListShortcuts => Self::ListShortcuts,
            MessageType::GetAppIcon => Self::GetAppIcon(envelope.body()?),
            MessageType::CreatePage => Self::CreatePage(envelope.body()?),
            MessageType::ModifyPage => Self::ModifyPage(envelope.body()?),
            MessageType::DeletePage => Self::DeletePage(envelope.body()?),
            MessageType::UpdateAppInfo => Self::UpdateAppInfo(envelope.body()?),
            MessageType::CreateExecutor => Self::CreateExecutor(envelope.body()?),
            MessageType::UpdateExecutor | MessageType::ModifyExecutor => {
                Self::UpdateExecutor(envelope.body()?)
            }
            MessageType::DeleteExecutor => Self::DeleteExecutor(envelope.body()?),
            MessageType::SwapExecutor => Self::SwapExecutor(envelope.body()?),
            MessageType::ExecuteAction => Self::ExecuteAction(envelope.body()?),
            other => return Err(DecodeError::Unsupported(String::from(other.as_str()))),
        };
        Ok(request)
    }

    /// Tag this request is sent under.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::ListPages => MessageType::ListPages,
            Self::ListApps => MessageType::ListApps,
            Self::ListShortcuts => MessageType::ListShortcuts,
            Self::GetAppIcon(_) => MessageType::GetAppIcon,
            Self::CreatePage(_) => MessageType::CreatePage,
            Self::ModifyPage(_) => MessageType::ModifyPage,
            Self::DeletePage(_) => MessageType::DeletePage,
            Self::UpdateAppInfo(_) => MessageType::UpdateAppInfo,
            Self::CreateExecutor(_) => MessageType::CreateExecutor,
            Self::UpdateExecutor(_) => MessageType::UpdateExecutor,
            Self::DeleteExecutor(_) => MessageType::DeleteExecutor,
            Self::SwapExecutor(_) => MessageType::SwapExecutor,
            Self::ExecuteAction(_) => MessageType::ExecuteAction,
        }
    }

    /// Encodes this request as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when the body cannot be serialised.
    pub fn to_envelope(&self) -> Result<Envelope, EncodeError> {
        let tag = self.message_type();
        match self {
            Self::ListPages | Self::ListApps | Self::ListShortcuts => Ok(Envelope::bare(tag)),
            Self::GetAppIcon(body) => Envelope::with_body(tag, body),
            Self::CreatePage(body) | Self::ModifyPage(body) => Envelope::with_body(tag, body),
            Self::DeletePage(body) => Envelope::with_body(tag, body),
            Self::UpdateAppInfo(body) => Envelope::with_body(tag, body),
            Self::CreateExecutor(body) => Envelope::with_body(tag, body),
            Self::UpdateExecutor(body) => Envelope::with_body(tag, body),
            Self::DeleteExecutor(body) => Envelope::with_body(tag, body),
            Self::SwapExecutor(body) => Envelope::with_body(tag, body),
            Self::ExecuteAction(body) => Envelope::with_body(tag, body),
        }
    }
}

/// A message emitted by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Every page.
    PagesList(PagesListResponse),
    /// Remembered applications.
    AppsList(AppsListResponse),
    /// Available shortcut names.
    ShortcutsList(ShortcutsListResponse),
    /// An application icon.
    AppIconData(AppIconDataResponse),
    /// Outcome of a page request.
    PageUpdated(PageUpdatedResponse),
    /// Outcome of an executor create or update.
    ExecutorUpdated(ExecutorOutcome),
    /// Outcome of an executor delete.
    ExecutorDeleted(ExecutorOutcome),
    /// Outcome of an executor swap.
    ExecutorSwapped(ExecutorOutcome),
    /// Outcome of an action run.
    ActionExecuted(ExecutorOutcome),
    /// The foreground application changed.
    FocusedAppUpdated(FocusedAppUpdate),
    /// A request could not be understood.
    Error(ErrorMessage),
}

impl Response {
    /// `error` response carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorMessage {
            message: message.into(),
        })
    }

    /// `error` response describing a decode failure.
    #[must_use]
    pub fn for_decode_error(error: &DecodeError) -> Self {
        Self::error(error.peer_message())
    }

    /// Tag this response is sent under.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::PagesList(_) => MessageType::PagesList,
            Self::AppsList(_) => MessageType::AppsList,
            Self::ShortcutsList(_) => MessageType::ShortcutsList,
            Self::AppIconData(_) => MessageType::AppIconData,
            Self::PageUpdated(_) => MessageType::PageUpdated,
            Self::ExecutorUpdated(_) => MessageType::ExecutorUpdated,
            Self::ExecutorDeleted(_) => MessageType::ExecutorDeleted,
            Self::ExecutorSwapped(_) => MessageType::ExecutorSwapped,
            Self::ActionExecuted(_) => MessageType::ActionExecuted,
            Self::FocusedAppUpdated(_) => MessageType::FocusedAppUpdated,
            Self::Error(_) => MessageType::Error,
        }
    }

    /// Encodes this response as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when the body cannot be serialised.
    pub fn to_envelope(&self) -> Result<Envelope, EncodeError> {
        let tag = self.message_type();
        match self {
            Self::PagesList(body) => Envelope::with_body(tag, body),
            Self::AppsList(body) => Envelope::with_body(tag, body),
            Self::ShortcutsList(body) => Envelope::with_body(tag, body),
            Self::AppIconData(body) => Envelope::with_body(tag, body),
            Self::PageUpdated(body) => Envelope::with_body(tag, body),
            Self::ExecutorUpdated(body)
            | Self::ExecutorDeleted(body)
            | Self::ExecutorSwapped(body)
            | Self::ActionExecuted(body) => Envelope::with_body(tag, body),
            Self::FocusedAppUpdated(body) => Envelope::with_body(tag, body),
            Self::Error(body) => Envelope::with_body(tag, body),
        }
    }

    /// Encodes this response as a terminated frame.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when the body cannot be serialised.
    pub fn to_frame(&self) -> Result<Vec<u8>, EncodeError> {
        self.to_envelope()?.to_frame()
    }

    /// Interprets an envelope as a response.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Unsupported`] for request or unknown tags and
    /// [`DecodeError::Payload`] for malformed bodies.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, DecodeError> {
        let Some(message_type) = envelope.known_type() else {
            return Err(DecodeError::Unsupported(envelope.message_type.clone()));
        };
        let response = match message_type {
            MessageType::PagesList => Self::PagesList(envelope.body()?),
            MessageType::AppsList => Self::AppsList(envelope.body()?),
            MessageType::ShortcutsList => Self::ShortcutsList(envelope.body()?),
            MessageType::AppIconData => Self::AppIconData(envelope.body()?),
            MessageType::PageUpdated => Self::PageUpdated(envelope.body()?),
            MessageType::ExecutorUpdated => Self::ExecutorUpdated(envelope.body()?),
            MessageType::ExecutorDeleted => Self::ExecutorDeleted(envelope.body()?),
            MessageType::ExecutorSwapped => Self::ExecutorSwapped(envelope.body()?),
            MessageType::ActionExecuted => Self::ActionExecuted(envelope.body()?),
            MessageType::FocusedAppUpdated => Self::FocusedAppUpdated(envelope.body()?),
            MessageType::Error => Self::Error(envelope.body()?),
            other => return Err(DecodeError::Unsupported(String::from(other.as_str()))),
        };
        Ok(response)
    }

    /// Decodes a frame into a response.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the envelope, tag, or payload is invalid.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        Self::from_envelope(&Envelope::decode(frame)?)
    }
}
