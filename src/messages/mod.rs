//! Bilingual (JA/EN) user-facing message catalog.
//!
//! Every reply the bot sends carries a Japanese line followed by its English
//! counterpart. Keeping the catalog in one place makes the command layer a
//! pure dispatcher.

/// Keys for static catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    GuildOnly,
    NeedSetup,
    NeedAuth,
    Ready,
    AuthUrlSent,
    AuthUrlFailed,
    RecordStart,
    RecordAlready,
    VoiceJoinFirst,
    VoiceConnectFailed,
    RecordStopNoRecord,
    RecordStopDone,
    NoAudioDetected,
    MinutesFailed,
    SetupSaved,
    SetupFailed,
    InternalError,
}

fn catalog(key: MessageKey) -> (&'static str, &'static str) {
    match key {
        MessageKey::GuildOnly => (
            "このコマンドはサーバー内でのみ実行できます。",
            "This command can only be used inside a server (guild).",
        ),
        MessageKey::NeedSetup => (
            "❌ まず `/setup` を実行してサーバー設定を登録してください。",
            "❌ Please run `/setup` first to configure this server.",
        ),
        MessageKey::NeedAuth => (
            "❌ `/google_auth` を実行して Google アカウントと連携してください。",
            "❌ Run `/google_auth` to connect your Google account.",
        ),
        MessageKey::Ready => (
            "✅ すべての準備が整っています！ `/record_start` で録音を開始できます。",
            "✅ All set! You can start recording with `/record_start`.",
        ),
        MessageKey::AuthUrlSent => (
            "✅ 認証用のURLをダイレクトメッセージに送信しました。DMを確認してください。",
            "✅ Sent the authentication URL to you via Direct Message. Please check your DMs.",
        ),
        MessageKey::AuthUrlFailed => (
            "❌ 認証URLの取得に失敗しました。管理者に連絡してください。",
            "❌ Failed to obtain the authentication URL. Please contact an administrator.",
        ),
        MessageKey::RecordStart => (
            "✅ 録音を開始しました。/record_stop で停止します。",
            "✅ Recording started. Use /record_stop to stop.",
        ),
        MessageKey::RecordAlready => (
            "⚠️ すでに録音中です。/record_stop で停止してください。",
            "⚠️ Recording is already in progress. Please stop it with /record_stop.",
        ),
        MessageKey::VoiceJoinFirst => (
            "❌ 先にボイスチャンネルへ参加してください。",
            "❌ Please join a voice channel first.",
        ),
        MessageKey::VoiceConnectFailed => (
            "❌ ボイスチャンネルへの接続に失敗しました。",
            "❌ Failed to connect to the voice channel.",
        ),
        MessageKey::RecordStopNoRecord => (
            "❌ 現在録音は行われていません。",
            "❌ Recording is not currently running.",
        ),
        MessageKey::RecordStopDone => (
            "⏹️ 録音を停止しました。録音データを処理します…",
            "⏹️ Recording stopped. Processing the audio…",
        ),
        MessageKey::NoAudioDetected => (
            "⚠️ 録音データが空でした。ボイスチャンネルでの音声が検出されませんでした。",
            "⚠️ The recording was empty. No speech was detected in the voice channel.",
        ),
        MessageKey::MinutesFailed => (
            "❌ 議事録の作成に失敗しました。",
            "❌ Failed to create the meeting minutes.",
        ),
        MessageKey::SetupSaved => (
            "✅ サーバー設定を保存しました。",
            "✅ Server settings saved.",
        ),
        MessageKey::SetupFailed => (
            "❌ 設定の保存に失敗しました。ボットの管理者に連絡してください。",
            "❌ Failed to save the settings. Please contact the bot administrator.",
        ),
        MessageKey::InternalError => (
            "❌ エラーが発生しました。しばらくしてからもう一度お試しください。",
            "❌ Something went wrong. Please try again later.",
        ),
    }
}

/// Combined JA + EN message for `key`.
pub fn msg(key: MessageKey) -> String {
    let (ja, en) = catalog(key);
    format!("{ja}\n{en}")
}

/// Announcement posted when a finished capture contains speaker audio.
pub fn speakers_detected(speaker_ids: &[u64]) -> String {
    let mentions: Vec<String> = speaker_ids.iter().map(|id| format!("<@{id}>")).collect();
    let joined = mentions.join(", ");
    format!(
        "🎤 録音を検出しました: {joined}. 処理を開始します…\n\
         🎤 Detected recordings from: {joined}. Starting processing…"
    )
}

/// Final notice carrying the uploaded document URL.
pub fn minutes_created(url: &str) -> String {
    format!(
        "✅ 議事録を作成しました: {url}\n\
         ✅ Meeting minutes created: {url}"
    )
}

/// DM body that delivers the Google consent URL.
pub fn authorization_dm(guild_name: &str, auth_url: &str) -> String {
    format!(
        "こんにちは！ **{guild_name}** サーバーとの連携を続けるには、以下のリンクをクリックして\
         Googleアカウントで認証してください。\n\
         🔗 {auth_url}\n\
         このリンクはあなた専用です。他人と共有しないでください。\n\
         Hi! To finish linking the **{guild_name}** server, open the link above and approve access \
         with your Google account. The link is personal; do not share it."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_has_both_languages() {
        let text = msg(MessageKey::NeedSetup);
        let mut lines = text.lines();
        assert!(lines.next().unwrap().contains("/setup"));
        assert!(lines.next().unwrap().contains("/setup"));
    }

    #[test]
    fn test_speakers_detected_mentions_each_speaker() {
        let text = speakers_detected(&[111, 222]);
        assert!(text.contains("<@111>"));
        assert!(text.contains("<@222>"));
    }

    #[test]
    fn test_minutes_created_contains_url() {
        let text = minutes_created("https://docs.google.com/document/d/abc/edit");
        assert!(text.contains("https://docs.google.com/document/d/abc/edit"));
    }

    #[test]
    fn test_authorization_dm_contains_link_and_guild() {
        let text = authorization_dm("dev-team", "https://example.com/auth");
        assert!(text.contains("dev-team"));
        assert!(text.contains("https://example.com/auth"));
    }
}
