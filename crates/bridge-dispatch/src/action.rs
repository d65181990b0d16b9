//! Typed output of the Command Dispatcher.

/// `/subagents [list|stop <id>|stop all|log <id>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubagentsAction {
    List,
    Stop { run_id: String },
    StopAll,
    Log { run_id: String },
}

/// `/cron list | add "<name>" <schedule> | remove <id> | run <id> | enable|disable <id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronAction {
    List,
    Add { name: String, schedule: String },
    Remove { job_id: String },
    Run { job_id: String },
    Enable { job_id: String },
    Disable { job_id: String },
}

/// On/off toggle that also supports bare `/stream` / `/verbose` (show
/// current value, do not change it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleArg {
    Show,
    On,
    Off,
}

/// `/spawn "<task>" [--label <label>] [--cli <cli>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnArgs {
    pub task: String,
    pub label: Option<String>,
    pub cli: Option<String>,
}

/// Pure text → typed action. `None` from [`crate::dispatch`]
/// means "not a recognized command, forward to the agent" — `handled:
/// false` in spec terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    UseCli { cli: String },
    SetModel { alias: String },
    New,
    Stop,
    Interrupt,
    Restart,
    Status,
    Stream(ToggleArg),
    Verbose(ToggleArg),
    Spawn(SpawnArgs),
    Subagents(SubagentsAction),
    Cron(CronAction),
    /// Workspace queries delegated to an external concept-index
    /// collaborator — the dispatcher only recognizes the verb
    /// and forwards the raw argument string.
    Concepts { term: String },
    Related { term: String },
    File { path: String },
    Aliases { args: String },
    /// A recognized `/cron` or `/subagents` prefix with an unknown
    /// sub-verb.
    Usage { command: &'static str, message: String },
}
