//! Character profiles and the mapping from a profile to a server command line.

use crate::config::LaunchSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A named voice profile served by its own server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Stable identifier, also the key in the process table.
    pub name: String,
    /// Name shown to operators.
    pub display_name: String,
    /// Port the server binds.
    pub port: u16,
    /// SoVITS weights (`-s`).
    pub sovits_path: PathBuf,
    /// GPT weights (`-g`).
    pub gpt_path: PathBuf,
    /// Reference audio clip (`-dr`).
    pub ref_audio_path: PathBuf,
    /// Transcript of the reference clip (`-dt`).
    pub ref_text: String,
}

impl CharacterProfile {
    /// Base URL of this character's server.
    pub fn base_url(&self, bind_address: &str) -> String {
        format!("http://{bind_address}:{}", self.port)
    }

    /// Streaming audio endpoint of this character's server.
    pub fn stream_url(&self, bind_address: &str) -> String {
        format!("{}/stream", self.base_url(bind_address))
    }
}

impl fmt::Display for CharacterProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.name)
    }
}

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// Returns the value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Builds the server command line for `profile`.
///
/// Pure: the same inputs always yield the same command.
pub fn build_launch_command(settings: &LaunchSettings, profile: &CharacterProfile) -> LaunchCommand {
    let args = vec![
        settings.entry_script.display().to_string(),
        "-s".to_owned(),
        profile.sovits_path.display().to_string(),
        "-g".to_owned(),
        profile.gpt_path.display().to_string(),
        "-dr".to_owned(),
        profile.ref_audio_path.display().to_string(),
        "-dt".to_owned(),
        profile.ref_text.clone(),
        "-dl".to_owned(),
        settings.language.clone(),
        "-d".to_owned(),
        settings.device.clone(),
        "-a".to_owned(),
        settings.bind_address.clone(),
        "-p".to_owned(),
        profile.port.to_string(),
    ];
    LaunchCommand {
        program: settings.program.clone(),
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_roster;

    fn hutao() -> CharacterProfile {
        default_roster()
            .into_iter()
            .find(|c| c.name == "HuTao")
            .unwrap_or_else(|| unreachable!("HuTao is in the default roster"))
    }

    #[test]
    fn command_layout() {
        let cmd = build_launch_command(&LaunchSettings::default(), &hutao());
        assert_eq!(cmd.program, "python");
        assert_eq!(cmd.args[0], "api.py");
        assert_eq!(cmd.flag_value("-s"), Some("SoVITS_weights_v2/Hutao_e8_s120.pth"));
        assert_eq!(cmd.flag_value("-g"), Some("GPT_weights_v2/HuTao-e15.ckpt"));
        assert_eq!(cmd.flag_value("-dl"), Some("zh"));
        assert_eq!(cmd.flag_value("-d"), Some("cuda"));
        assert_eq!(cmd.flag_value("-a"), Some("127.0.0.1"));
        assert_eq!(cmd.flag_value("-p"), Some("5002"));
        assert_eq!(cmd.args.len(), 17);
    }

    #[test]
    fn command_is_deterministic() {
        let settings = LaunchSettings::default();
        let profile = hutao();
        assert_eq!(
            build_launch_command(&settings, &profile),
            build_launch_command(&settings, &profile)
        );
    }

    #[test]
    fn port_change_only_touches_port_argument() {
        let settings = LaunchSettings::default();
        let original = hutao();
        let mut moved = original.clone();
        moved.port = 6123;

        let a = build_launch_command(&settings, &original);
        let b = build_launch_command(&settings, &moved);
        assert_eq!(a.program, b.program);
        assert_eq!(a.args.len(), b.args.len());

        let differing: Vec<usize> = a
            .args
            .iter()
            .zip(&b.args)
            .enumerate()
            .filter(|(_, (x, y))| x != y)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(differing, vec![a.args.len() - 1]);
        assert_eq!(b.flag_value("-p"), Some("6123"));
    }

    #[test]
    fn reference_text_is_a_single_argument() {
        let cmd = build_launch_command(&LaunchSettings::default(), &hutao());
        assert_eq!(
            cmd.flag_value("-dt"),
            Some("嘿嘿，毕竟找活人不是我擅长的事嘛，如果让我找的是「边界」另一边的人….")
        );
    }

    #[test]
    fn urls() {
        let profile = hutao();
        assert_eq!(profile.base_url("127.0.0.1"), "http://127.0.0.1:5002");
        assert_eq!(profile.stream_url("127.0.0.1"), "http://127.0.0.1:5002/stream");
        assert_eq!(profile.to_string(), "胡桃 (HuTao)");
    }
}
