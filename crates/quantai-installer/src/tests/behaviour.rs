//! BDD step definitions for end-to-end installation runs.
//!
//! Scenarios live in `tests/features/installation.feature`. Each run uses a
//! temporary workspace with a pre-existing checkout, scripted operator answers
//! and a [`RecordingRunner`] in place of the shell.

use std::cell::RefCell;
use std::fs;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use quantai_config::CharacterMode;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;
use tempfile::TempDir;

use super::{LogBuffer, RecordingRunner, ScriptedPrompter};
use crate::layout::InstallLayout;
use crate::manifest::{PLUGIN_PACKAGE, WORKSPACE_REFERENCE};
use crate::pipeline::{
    Orchestrator, PipelineError, StartInstructions, StepSettings, SystemSteps,
};
use crate::secrets::{SecretField, SecretScope};
use crate::telemetry::Telemetry;

const CHECKOUT: &str = "eliza";
const BUILD_COMMAND: &str = "pnpm install && pnpm build";
const COOKIE_JSON: &str = r#"{"a":1}"#;

struct InstallWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    answers: Vec<String>,
    runner: Option<RecordingRunner>,
    logs: LogBuffer,
    outcome: Option<Result<StartInstructions, PipelineError>>,
    commands: Vec<(String, Utf8PathBuf)>,
}

impl Default for InstallWorld {
    fn default() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        Self {
            _dir: dir,
            root,
            answers: Vec::new(),
            runner: None,
            logs: LogBuffer::default(),
            outcome: None,
            commands: Vec::new(),
        }
    }
}

impl InstallWorld {
    fn workspace(&self) -> Utf8PathBuf {
        self.root.join("workspace")
    }

    fn checkout(&self) -> Utf8PathBuf {
        self.workspace().join(CHECKOUT)
    }

    fn plugin(&self) -> Utf8PathBuf {
        self.root.join("plugin")
    }

    fn answer_cookie(&mut self, cookie: String) {
        // A blank database name is a single prompt, so the cookie is the
        // seventh answer.
        self.answers = vec![String::new(); SecretField::ALL.len() - 1];
        self.answers.push(cookie);
    }

    fn run(&mut self) {
        let plugin = self.plugin();
        let layout = InstallLayout::new(
            self.workspace(),
            CHECKOUT,
            plugin.clone(),
            plugin.join("characters/quantai.character.json"),
        )
        .expect("layout");
        let settings = StepSettings {
            repository_url: String::from("https://example.invalid/eliza.git"),
            build_command: String::from(BUILD_COMMAND),
            character_mode: CharacterMode::Template,
        };
        let runner = self.runner.take().unwrap_or_default();
        let prompter = ScriptedPrompter::new(self.answers.clone());
        let mut steps = SystemSteps::new(layout, settings, runner, prompter);

        let sink = self.logs.clone();
        let telemetry = Telemetry::with_writer(
            &quantai_config::InstallerConfig::default(),
            move || sink.clone(),
            false,
        )
        .expect("telemetry");
        let orchestrator =
            Orchestrator::new(StartInstructions::for_mode(CHECKOUT, CharacterMode::Template));

        self.outcome = Some(telemetry.scope(|| orchestrator.run(&mut steps)));
        self.commands = steps.runner().calls();
    }

    fn manifest(&self) -> Value {
        read_json(&self.checkout().join("agent/package.json"))
    }

    fn character(&self) -> Value {
        read_json(&self.checkout().join("characters/quantai.character.json"))
    }

    fn credential(&self, field: SecretField) -> Value {
        let section = match field.scope() {
            SecretScope::Authentication => "secrets",
            SecretScope::Platform => "settings",
        };
        self.character()
            .get(section)
            .and_then(|values| values.get(field.key()))
            .cloned()
            .unwrap_or_else(|| panic!("{field} missing from '{section}'"))
    }
}

fn write(path: &Utf8Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write file");
}

fn read_json(path: &Utf8Path) -> Value {
    let text = fs::read_to_string(path).expect("read document");
    serde_json::from_str(&text).expect("document is JSON")
}

#[fixture]
fn world() -> RefCell<InstallWorld> {
    RefCell::new(InstallWorld::default())
}

// ---------------------------------------------------------------------------
// Given
// ---------------------------------------------------------------------------

#[given("a framework checkout whose agent manifest declares \"{name}\" at \"{version}\"")]
fn given_checkout(world: &RefCell<InstallWorld>, name: String, version: String) {
    let checkout = world.borrow().checkout();
    write(
        &checkout.join("agent/package.json"),
        &format!(r#"{{"name": "@elizaos/agent", "dependencies": {{"{name}": "{version}"}}}}"#),
    );
    write(&checkout.join("agent/src/index.ts"), "// framework entry");
}

#[given("plugin sources with a character template")]
fn given_plugin_sources(world: &RefCell<InstallWorld>) {
    let plugin = world.borrow().plugin();
    write(&plugin.join("package.json"), r#"{"name": "@ai16z/plugin-trading-assistant"}"#);
    write(&plugin.join("index.ts.backup"), "// plugin entry");
    write(&plugin.join("src/index.ts"), "export {};");
    write(&plugin.join(".git/HEAD"), "ref: refs/heads/main");
    write(&plugin.join("node_modules/axios/index.js"), "");
    write(
        &plugin.join("characters/quantai.character.json"),
        r#"{"name": "QuantAI", "clients": ["telegram"], "settings": {"voice": "male"}, "secrets": {}}"#,
    );
}

#[given("the operator skips every prompt")]
fn given_skipped_prompts(world: &RefCell<InstallWorld>) {
    world.borrow_mut().answers.clear();
}

#[given("the operator answers the cookie prompt with an encoded JSON object")]
fn given_encoded_cookie(world: &RefCell<InstallWorld>) {
    world.borrow_mut().answer_cookie(STANDARD.encode(COOKIE_JSON));
}

#[given("the operator answers the cookie prompt with \"{cookie}\"")]
fn given_literal_cookie(world: &RefCell<InstallWorld>, cookie: String) {
    world.borrow_mut().answer_cookie(cookie);
}

#[given("the build command fails")]
fn given_failing_build(world: &RefCell<InstallWorld>) {
    world.borrow_mut().runner = Some(RecordingRunner::failing_on("pnpm"));
}

// ---------------------------------------------------------------------------
// When
// ---------------------------------------------------------------------------

#[when("the installer runs")]
fn when_installer_runs(world: &RefCell<InstallWorld>) {
    world.borrow_mut().run();
}

// ---------------------------------------------------------------------------
// Then
// ---------------------------------------------------------------------------

#[then("the installation succeeds")]
fn then_succeeds(world: &RefCell<InstallWorld>) {
    let state = world.borrow();
    match state.outcome.as_ref() {
        Some(Ok(_)) => {}
        Some(Err(error)) => panic!("installation failed: {error}"),
        None => panic!("installer did not run"),
    }
}

#[then("the installation fails at the \"{step}\" step")]
fn then_fails_at(world: &RefCell<InstallWorld>, step: String) {
    let state = world.borrow();
    match state.outcome.as_ref() {
        Some(Err(error)) => assert_eq!(error.step.name(), step),
        Some(Ok(_)) => panic!("installation unexpectedly succeeded"),
        None => panic!("installer did not run"),
    }
}

#[then("no clone was attempted")]
fn then_no_clone(world: &RefCell<InstallWorld>) {
    let state = world.borrow();
    assert!(
        state
            .commands
            .iter()
            .all(|(command, _)| !command.starts_with("git clone")),
        "commands: {:?}",
        state.commands
    );
}

#[then("the plugin sources were copied without excluded entries")]
fn then_sources_copied(world: &RefCell<InstallWorld>) {
    let destination = world
        .borrow()
        .checkout()
        .join("packages/plugin-trading-assistant");
    assert!(destination.join("src/index.ts").is_file());
    assert!(destination.join("package.json").is_file());
    assert!(!destination.join(".git").exists());
    assert!(!destination.join("node_modules").exists());
}

#[then("the agent manifest declares \"{name}\" at \"{version}\"")]
fn then_manifest_keeps(world: &RefCell<InstallWorld>, name: String, version: String) {
    let manifest = world.borrow().manifest();
    assert_eq!(manifest["dependencies"][name.as_str()], version.as_str());
}

#[then("the agent manifest references the plugin from the workspace")]
fn then_manifest_references_plugin(world: &RefCell<InstallWorld>) {
    let manifest = world.borrow().manifest();
    assert_eq!(manifest["dependencies"][PLUGIN_PACKAGE], WORKSPACE_REFERENCE);
}

#[then("every credential in the character configuration is empty")]
fn then_credentials_empty(world: &RefCell<InstallWorld>) {
    let state = world.borrow();
    for field in SecretField::ALL {
        assert_eq!(state.credential(field), "", "{field} should be empty");
    }
    let character = state.character();
    assert_eq!(character["settings"]["voice"], "male");
    assert_eq!(character["clients"][0], "telegram");
}

#[then("the stored cookie value is the decoded JSON object")]
fn then_cookie_decoded(world: &RefCell<InstallWorld>) {
    let cookie = world.borrow().credential(SecretField::TwitterCookies);
    assert_eq!(cookie, COOKIE_JSON);
}

#[then("the stored cookie value is empty")]
fn then_cookie_empty(world: &RefCell<InstallWorld>) {
    let cookie = world.borrow().credential(SecretField::TwitterCookies);
    assert_eq!(cookie, "");
}

#[then("a warning about the cookie blob was logged")]
fn then_cookie_warning(world: &RefCell<InstallWorld>) {
    let logs = world.borrow().logs.contents();
    assert!(
        logs.lines()
            .any(|line| line.contains("WARN") && line.contains("invalid cookie blob")),
        "logs: {logs}"
    );
}

#[then("the build command ran in the checkout")]
fn then_build_ran(world: &RefCell<InstallWorld>) {
    let state = world.borrow();
    assert_eq!(
        state.commands,
        [(String::from(BUILD_COMMAND), state.checkout())]
    );
}

#[scenario(
    path = "tests/features/installation.feature",
    name = "Skipped prompts produce empty credentials"
)]
fn skipped_prompts(world: RefCell<InstallWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/installation.feature",
    name = "Encoded cookie is stored as its decoded JSON text"
)]
fn encoded_cookie(world: RefCell<InstallWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/installation.feature",
    name = "Garbage cookie degrades to an empty value"
)]
fn garbage_cookie(world: RefCell<InstallWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/installation.feature",
    name = "A failing build stops the run at its step"
)]
fn failing_build(world: RefCell<InstallWorld>) {
    let _ = world;
}
