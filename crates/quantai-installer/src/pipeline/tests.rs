//! Unit tests for pipeline sequencing and the production steps.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use mockall::Sequence;
use quantai_config::CharacterMode;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::layout::InstallLayout;
use crate::process::CommandError;
use crate::secrets::SecretField;
use crate::tests::{RecordingRunner, ScriptedPrompter};

fn instructions() -> StartInstructions {
    StartInstructions::for_mode("eliza", CharacterMode::Template)
}

fn failure() -> InstallError {
    InstallError::Command(CommandError::Failed {
        command: String::from("git clone"),
        status: Some(128),
    })
}

/// Expects every step before `failing` once, `failing` once with an error,
/// and every later step never.
fn steps_failing_at(failing: PipelineStep) -> MockInstallSteps {
    let mut steps = MockInstallSteps::new();
    let position = PipelineStep::ORDER
        .iter()
        .position(|step| *step == failing)
        .expect("step is in ORDER");

    for (index, step) in PipelineStep::ORDER.into_iter().enumerate() {
        let times = usize::from(index <= position);
        let fails = index == position;
        let result = move || if fails { Err(failure()) } else { Ok(()) };
        match step {
            PipelineStep::EnsureRepository => {
                steps.expect_ensure_repository().times(times).returning(result);
            }
            PipelineStep::SyncPluginSources => {
                steps
                    .expect_sync_plugin_sources()
                    .times(times)
                    .returning(result);
            }
            PipelineStep::PatchManifest => {
                steps.expect_patch_manifest().times(times).returning(result);
            }
            PipelineStep::ReplaceEntryPoint => {
                steps
                    .expect_replace_entry_point()
                    .times(times)
                    .returning(result);
            }
            PipelineStep::BuildCharacter => {
                steps.expect_build_character().times(times).returning(result);
            }
            PipelineStep::InstallAndBuild => {
                steps.expect_install_and_build().times(times).returning(result);
            }
        }
    }
    steps
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[test]
fn all_steps_run_once_in_order() {
    let mut steps = MockInstallSteps::new();
    let mut seq = Sequence::new();
    steps
        .expect_ensure_repository()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    steps
        .expect_sync_plugin_sources()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    steps
        .expect_patch_manifest()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    steps
        .expect_replace_entry_point()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    steps
        .expect_build_character()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    steps
        .expect_install_and_build()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));

    let result = Orchestrator::new(instructions()).run(&mut steps);
    assert_eq!(result.expect("pipeline succeeds"), instructions());
}

#[rstest]
#[case(PipelineStep::EnsureRepository)]
#[case(PipelineStep::SyncPluginSources)]
#[case(PipelineStep::PatchManifest)]
#[case(PipelineStep::ReplaceEntryPoint)]
#[case(PipelineStep::BuildCharacter)]
#[case(PipelineStep::InstallAndBuild)]
fn failure_short_circuits_later_steps(#[case] failing: PipelineStep) {
    let mut steps = steps_failing_at(failing);
    let err = Orchestrator::new(instructions())
        .run(&mut steps)
        .expect_err("pipeline should fail");
    assert_eq!(err.step, failing);
    assert!(err.to_string().contains(failing.name()));
}

#[test]
fn start_instructions_name_checkout_and_character() {
    let text = StartInstructions::for_mode("eliza", CharacterMode::Template).to_string();
    assert_eq!(
        text,
        "Installation completed successfully!\n\
         To start the agent, run:\n\
         cd eliza\n\
         pnpm run start --character='characters/quantai.character.json'"
    );
}

#[test]
fn fresh_instructions_point_into_the_plugin_package() {
    let instructions = StartInstructions::for_mode("eliza", CharacterMode::Fresh);
    assert_eq!(
        instructions.character_path(),
        "packages/plugin-trading-assistant/characters/quantai.character.json"
    );
}

// ---------------------------------------------------------------------------
// System steps
// ---------------------------------------------------------------------------

struct Sandbox {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Sandbox {
    fn workspace(&self) -> Utf8PathBuf {
        self.root.join("workspace")
    }

    fn plugin(&self) -> Utf8PathBuf {
        self.root.join("plugin")
    }

    fn steps(&self, mode: CharacterMode) -> SystemSteps<RecordingRunner, ScriptedPrompter> {
        self.steps_with(mode, RecordingRunner::default())
    }

    fn steps_with(
        &self,
        mode: CharacterMode,
        runner: RecordingRunner,
    ) -> SystemSteps<RecordingRunner, ScriptedPrompter> {
        let plugin = self.plugin();
        let layout = InstallLayout::new(
            self.workspace(),
            "eliza",
            plugin.clone(),
            plugin.join("characters/quantai.character.json"),
        )
        .expect("layout");
        let settings = StepSettings {
            repository_url: String::from("https://example.invalid/eliza.git"),
            build_command: String::from("pnpm install && pnpm build"),
            character_mode: mode,
        };
        SystemSteps::new(layout, settings, runner, ScriptedPrompter::default())
    }
}

fn write(path: &Utf8Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write file");
}

#[fixture]
fn sandbox() -> Sandbox {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
    let sandbox = Sandbox { _dir: dir, root };
    write(&sandbox.plugin().join("index.ts.backup"), "// plugin entry");
    write(&sandbox.plugin().join("src/index.ts"), "export {};");
    write(
        &sandbox.plugin().join("characters/quantai.character.json"),
        r#"{"name": "QuantAI", "settings": {}, "secrets": {}}"#,
    );
    sandbox
}

#[rstest]
fn absent_checkout_is_cloned_into_the_workspace(sandbox: Sandbox) {
    let mut steps = sandbox.steps(CharacterMode::Template);
    steps.ensure_repository().expect("clone");

    assert!(sandbox.workspace().is_dir());
    assert_eq!(
        steps.runner().calls(),
        [(
            String::from("git clone 'https://example.invalid/eliza.git' 'eliza'"),
            sandbox.workspace()
        )]
    );
}

#[rstest]
fn existing_checkout_skips_the_clone(sandbox: Sandbox) {
    fs::create_dir_all(sandbox.workspace().join("eliza")).expect("mkdir");
    let mut steps = sandbox.steps(CharacterMode::Template);
    steps.ensure_repository().expect("skip");
    assert!(steps.runner().commands().is_empty());
}

#[rstest]
fn checkout_path_occupied_by_a_file_fails(sandbox: Sandbox) {
    write(&sandbox.workspace().join("eliza"), "not a directory");
    let mut steps = sandbox.steps(CharacterMode::Template);
    let err = steps.ensure_repository().expect_err("file should fail");
    assert!(
        matches!(err, InstallError::CheckoutNotDirectory { .. }),
        "got {err}"
    );
    assert!(steps.runner().commands().is_empty());
}

#[rstest]
fn failed_clone_propagates(sandbox: Sandbox) {
    let mut steps =
        sandbox.steps_with(CharacterMode::Template, RecordingRunner::failing_on("git clone"));
    let err = steps.ensure_repository().expect_err("clone should fail");
    assert!(matches!(err, InstallError::Command(_)), "got {err}");
}

#[rstest]
fn entry_point_is_overwritten_from_backup(sandbox: Sandbox) {
    let target = sandbox.workspace().join("eliza/agent/src/index.ts");
    write(&target, "// framework entry");
    let mut steps = sandbox.steps(CharacterMode::Template);

    steps.replace_entry_point().expect("replace");
    assert_eq!(fs::read_to_string(&target).expect("read"), "// plugin entry");
}

#[rstest]
fn entry_point_directory_is_not_created(sandbox: Sandbox) {
    let mut steps = sandbox.steps(CharacterMode::Template);
    let err = steps.replace_entry_point().expect_err("missing dir should fail");
    assert!(matches!(err, InstallError::EntryPoint { .. }), "got {err}");
}

#[rstest]
fn build_runs_in_the_checkout(sandbox: Sandbox) {
    let mut steps = sandbox.steps(CharacterMode::Template);
    steps.install_and_build().expect("build");
    assert_eq!(
        steps.runner().calls(),
        [(
            String::from("pnpm install && pnpm build"),
            sandbox.workspace().join("eliza")
        )]
    );
}

#[rstest]
#[case(CharacterMode::Template, "eliza/characters/quantai.character.json")]
#[case(
    CharacterMode::Fresh,
    "eliza/packages/plugin-trading-assistant/characters/quantai.character.json"
)]
fn character_lands_where_the_mode_says(
    sandbox: Sandbox,
    #[case] mode: CharacterMode,
    #[case] relative: &str,
) {
    let mut steps = sandbox.steps(mode);
    steps.build_character().expect("character");
    assert!(sandbox.workspace().join(relative).is_file());
    assert_eq!(steps.prompter().labels().len(), SecretField::ALL.len());
}

#[rstest]
fn sync_then_patch_prepares_the_checkout(sandbox: Sandbox) {
    write(
        &sandbox.workspace().join("eliza/agent/package.json"),
        r#"{"dependencies": {"x": "1.0.0"}}"#,
    );
    let mut steps = sandbox.steps(CharacterMode::Template);
    steps.sync_plugin_sources().expect("sync");
    steps.patch_manifest().expect("patch");

    let destination = sandbox
        .workspace()
        .join("eliza/packages/plugin-trading-assistant");
    assert!(destination.join("src/index.ts").is_file());
    let manifest = fs::read_to_string(sandbox.workspace().join("eliza/agent/package.json"))
        .expect("read manifest");
    assert!(manifest.contains("\"@ai16z/plugin-trading-assistant\": \"workspace:*\""));
}
