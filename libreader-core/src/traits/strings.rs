//! Localizable task step descriptions

/// Step descriptions and messages recorded by the account and book tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepText {
    AccountLookup,
    AccountFound,
    AccountMissing,

    LoginValidate,
    LoginValidated,
    LoginAuthenticate,
    LoginAuthenticated,
    LoginActivateDevice,
    LoginDeviceActivated,
    LoginNoDrmConnector,
    LoginSaveState,
    LoginStateSaved,

    LogoutNotLoggedIn,
    LogoutDeactivateDevice,
    LogoutDeviceDeactivated,
    LogoutDeleteBooks,
    LogoutBooksDeleted,
    LogoutBooksRemain,
    LogoutSaveState,
    LogoutStateSaved,

    RevokeBookLookup,
    RevokeBookFound,
    RevokeBookMissing,
    RevokeReturnLoan,
    RevokeLoanReturned,
    RevokeLoanNotReturnable,
    RevokeNoDrmConnector,
    RevokeClearRights,
    RevokeRightsCleared,
    RevokeNotifyServer,
    RevokeServerNotified,
    RevokeDeleteBook,
    RevokeBookDeleted,
}

/// Source of user-visible step texts.
pub trait TaskStrings: Send + Sync {
    fn text(&self, key: StepText) -> String;
}

/// Built-in English texts.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishTaskStrings;

impl TaskStrings for EnglishTaskStrings {
    fn text(&self, key: StepText) -> String {
        let text = match key {
            StepText::AccountLookup => "Looking up account",
            StepText::AccountFound => "Found account",
            StepText::AccountMissing => "No such account",

            StepText::LoginValidate => "Checking credentials",
            StepText::LoginValidated => "Credentials are acceptable",
            StepText::LoginAuthenticate => "Logging in to the library",
            StepText::LoginAuthenticated => "Library accepted the credentials",
            StepText::LoginActivateDevice => "Activating this device for DRM",
            StepText::LoginDeviceActivated => "Device activated",
            StepText::LoginNoDrmConnector => "No DRM support available, skipping activation",
            StepText::LoginSaveState => "Saving login",
            StepText::LoginStateSaved => "Logged in",

            StepText::LogoutNotLoggedIn => "Account is not logged in",
            StepText::LogoutDeactivateDevice => "Deactivating this device for DRM",
            StepText::LogoutDeviceDeactivated => "Device deactivated",
            StepText::LogoutDeleteBooks => "Deleting local books",
            StepText::LogoutBooksDeleted => "Local books deleted",
            StepText::LogoutBooksRemain => "Logged out, but some local books could not be deleted",
            StepText::LogoutSaveState => "Saving logout",
            StepText::LogoutStateSaved => "Logged out",

            StepText::RevokeBookLookup => "Looking up book",
            StepText::RevokeBookFound => "Found book",
            StepText::RevokeBookMissing => "No such book",
            StepText::RevokeReturnLoan => "Returning DRM loan",
            StepText::RevokeLoanReturned => "DRM loan returned",
            StepText::RevokeLoanNotReturnable => "DRM loan is not returnable, skipping",
            StepText::RevokeNoDrmConnector => "No DRM support available, skipping loan return",
            StepText::RevokeClearRights => "Clearing DRM rights",
            StepText::RevokeRightsCleared => "DRM rights cleared",
            StepText::RevokeNotifyServer => "Notifying the library",
            StepText::RevokeServerNotified => "Library accepted the return",
            StepText::RevokeDeleteBook => "Deleting book",
            StepText::RevokeBookDeleted => "Book deleted",
        };
        text.to_string()
    }
}
