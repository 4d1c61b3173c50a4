/*
[INPUT]:  Credentials, RSA public key material and login responses
[OUTPUT]: Encrypted login credentials, stored sessions and scheduled renewals
[POS]:    Auth layer - handles nExt API authentication
[UPDATE]: When auth flow or session handling changes
*/

pub mod crypto;
pub mod manager;
pub mod session;

pub use crypto::{LoginEncryptor, credential_plaintext, encrypt_login};
pub use manager::SessionManager;
pub use session::{Session, SessionStore, basic_authorization, renewal_delay};
