pub const ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";

pub const BASE_URL: &str = "wss://api.elevenlabs.io/v1/convai";

pub const API_KEY_HEADER: &str = "xi-api-key";

/// How long `close` waits for the agent to finish the closing handshake.
pub const CLOSE_HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
