//! Static fallback strategy tables
//!
//! Each strategy is one configuration of the search/download collaborator.
//! Tables are plain data so every entry can be tested on its own.

/// Simulated client identity presented to the video platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIdentity {
    /// yt-dlp `player_client` extractor argument
    pub player_client: &'static str,
    /// User-Agent header sent with requests
    pub user_agent: &'static str,
}

/// Android app client
pub const ANDROID_CLIENT: ClientIdentity = ClientIdentity {
    player_client: "android",
    user_agent: "com.google.android.youtube/17.36.4 (Linux; U; Android 12; GB) gzip",
};

/// iOS app client
pub const IOS_CLIENT: ClientIdentity = ClientIdentity {
    player_client: "ios",
    user_agent: "com.google.ios.youtube/17.36.4 (iPhone14,3; U; CPU iOS 15_6 like Mac OS X)",
};

/// Desktop web client
pub const WEB_CLIENT: ClientIdentity = ClientIdentity {
    player_client: "web",
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
};

/// Post-download audio conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioExtraction {
    /// Target codec passed to `--audio-format`
    pub codec: &'static str,
    /// Target bitrate passed to `--audio-quality`
    pub quality: &'static str,
}

/// One configuration variant of the search/download collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    /// Short name used in logs
    pub name: &'static str,
    /// Simulated client identity
    pub client: ClientIdentity,
    /// yt-dlp format selector
    pub format: &'static str,
    /// Convert the download to a fixed audio codec
    pub extract_audio: Option<AudioExtraction>,
    /// Pass the credentials file when one is available
    pub use_credentials: bool,
}

/// Strategies for voice-chat playback, tried in order
pub const PLAYBACK_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "android",
        client: ANDROID_CLIENT,
        format: "bestaudio/best",
        extract_audio: None,
        use_credentials: true,
    },
    // yt-dlp skips the ios client whenever cookies are passed
    Strategy {
        name: "ios",
        client: IOS_CLIENT,
        format: "bestaudio/best",
        extract_audio: None,
        use_credentials: false,
    },
    Strategy {
        name: "web-m4a",
        client: WEB_CLIENT,
        format: "ba[ext=m4a]/ba",
        extract_audio: None,
        use_credentials: true,
    },
];

const MP3_192: AudioExtraction = AudioExtraction {
    codec: "mp3",
    quality: "192K",
};

/// Strategies for `/download` file delivery, tried in order
pub const DELIVERY_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "android-mp3",
        client: ANDROID_CLIENT,
        format: "bestaudio/best",
        extract_audio: Some(MP3_192),
        use_credentials: true,
    },
    Strategy {
        name: "web-mp3",
        client: WEB_CLIENT,
        format: "bestaudio/best",
        extract_audio: Some(MP3_192),
        use_credentials: true,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_order_matches_fallback_chain() {
        let names: Vec<_> = PLAYBACK_STRATEGIES.iter().map(|s| s.name).collect();
        assert_eq!(names, ["android", "ios", "web-m4a"]);
        assert!(PLAYBACK_STRATEGIES.iter().all(|s| s.extract_audio.is_none()));
    }

    #[test]
    fn test_ios_never_uses_credentials() {
        assert!(PLAYBACK_STRATEGIES
            .iter()
            .filter(|s| s.client == IOS_CLIENT)
            .all(|s| !s.use_credentials));
    }

    #[test]
    fn test_delivery_always_converts_to_mp3() {
        assert!(!DELIVERY_STRATEGIES.is_empty());
        for strategy in DELIVERY_STRATEGIES {
            assert_eq!(strategy.extract_audio.map(|a| a.codec), Some("mp3"));
        }
    }
}
