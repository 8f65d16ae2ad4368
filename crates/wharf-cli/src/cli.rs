use clap::{ArgAction, ArgGroup, Args as ClapArgs, Parser, Subcommand, ValueHint};
use wharf_core::tasking::{JobState, VersionRef};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a default config file
    #[clap(name = "defconfig")]
    DefConfig,

    /// Print the configuration file to stdout
    Config,

    /// View env
    Env,

    /// Manage stored artifacts
    #[command(arg_required_else_help = true)]
    Artifact {
        #[clap(subcommand)]
        action: ArtifactAction,
    },

    /// Create and query content units
    #[command(arg_required_else_help = true)]
    Content {
        #[clap(subcommand)]
        action: ContentAction,
    },

    /// Manage repositories and their versions
    #[command(arg_required_else_help = true)]
    #[clap(name = "repo", visible_alias = "repository")]
    Repo {
        #[clap(subcommand)]
        action: RepoAction,
    },

    /// Manage remotes
    #[command(arg_required_else_help = true)]
    Remote {
        #[clap(subcommand)]
        action: RemoteAction,
    },

    /// Manage publishers and list publications
    #[command(arg_required_else_help = true)]
    Publisher {
        #[clap(subcommand)]
        action: PublisherAction,
    },

    /// Queue a sync of a repository from a remote
    #[command(arg_required_else_help = true)]
    Sync {
        /// Repository to sync into
        #[arg(required = true, short, long)]
        repository: String,

        /// Remote to sync from
        #[arg(required = true, long)]
        remote: String,

        /// Replace the repository content with the remote content
        #[arg(required = false, short, long)]
        mirror: bool,
    },

    /// Queue a publication of a repository version
    #[command(arg_required_else_help = true)]
    Publish(PublishArgs),

    /// Inspect and cancel jobs
    #[command(arg_required_else_help = true)]
    Job {
        #[clap(subcommand)]
        action: JobAction,
    },

    /// Run job workers
    Worker {
        /// Exit once no runnable jobs are left
        #[arg(required = false, short, long)]
        drain: bool,

        /// Number of concurrent workers
        #[arg(required = false, short, long)]
        workers: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum ArtifactAction {
    /// Copy a local file into the artifact store
    #[command(arg_required_else_help = true)]
    Import {
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        path: String,
    },

    /// List stored artifacts
    #[clap(name = "list", visible_alias = "ls")]
    List,
}

#[derive(Subcommand)]
pub enum ContentAction {
    /// Extract metadata from a stored artifact and create a content unit
    #[command(arg_required_else_help = true)]
    Create {
        /// Digest of the stored artifact
        #[arg(required = false, short, long)]
        artifact: Option<String>,

        /// Filename the distribution was uploaded as
        #[arg(required = false, short, long)]
        filename: Option<String>,
    },

    /// List content units
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Filter as field[__lookup]=value, e.g. `name=django` or `keywords__contains=web`
        #[arg(required = false, short, long)]
        filter: Vec<String>,

        /// Only content in the given repository version (repo@N)
        #[arg(required = false, short, long)]
        repository_version: Option<VersionRef>,

        #[arg(required = false, short, long)]
        limit: Option<i64>,

        #[arg(required = false, short, long)]
        offset: Option<i64>,
    },

    /// Show a content unit
    #[command(arg_required_else_help = true)]
    Show {
        #[arg(required = true)]
        id: i32,
    },
}

#[derive(Subcommand)]
pub enum RepoAction {
    /// Create a repository
    #[command(arg_required_else_help = true)]
    Create {
        #[arg(required = true)]
        name: String,
    },

    /// List repositories
    #[clap(name = "list", visible_alias = "ls")]
    List,

    /// List the versions of a repository
    #[command(arg_required_else_help = true)]
    Versions {
        #[arg(required = true)]
        name: String,
    },

    /// Create a new version with additional content units
    #[command(arg_required_else_help = true)]
    Add {
        #[arg(required = true)]
        name: String,

        /// Content unit ids to add
        #[arg(required = true, num_args = 1..)]
        content: Vec<i32>,
    },
}

#[derive(Subcommand)]
pub enum RemoteAction {
    /// Create a remote
    #[command(arg_required_else_help = true)]
    Create {
        #[arg(required = true)]
        name: String,

        #[arg(required = true, value_hint = ValueHint::Url)]
        url: String,
    },

    /// Point a remote at a new URL
    #[command(arg_required_else_help = true)]
    Update {
        #[arg(required = true)]
        name: String,

        #[arg(required = true, value_hint = ValueHint::Url)]
        url: String,
    },

    /// List remotes
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Filter as field[__lookup]=value, e.g. `name__in=a,b` or `last_updated__gte=2025-01-01`
        #[arg(required = false, short, long)]
        filter: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PublisherAction {
    /// Create a publisher
    #[command(arg_required_else_help = true)]
    Create {
        #[arg(required = true)]
        name: String,
    },

    /// List publishers
    #[clap(name = "list", visible_alias = "ls")]
    List,

    /// List publications, newest first
    Publications {
        /// Only publications made by this publisher
        #[arg(required = false)]
        name: Option<String>,
    },
}

#[derive(ClapArgs)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["repository", "repository_version"])
))]
pub struct PublishArgs {
    /// Publisher to publish with
    #[arg(required = true, short, long)]
    pub publisher: String,

    /// Publish the latest version of this repository
    #[arg(short, long)]
    pub repository: Option<String>,

    /// Publish this repository version (repo@N)
    #[arg(long)]
    pub repository_version: Option<VersionRef>,
}

#[derive(Subcommand)]
pub enum JobAction {
    /// Show a job
    #[command(arg_required_else_help = true)]
    Status {
        #[arg(required = true)]
        id: i32,
    },

    /// List jobs, newest first
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Only jobs in this state
        #[arg(required = false, short, long)]
        state: Option<JobState>,

        #[arg(required = false, short, long)]
        limit: Option<i64>,
    },

    /// Cancel a queued job
    #[command(arg_required_else_help = true)]
    Cancel {
        #[arg(required = true)]
        id: i32,
    },

    /// Fail running jobs whose reservation lease expired
    Recover,
}
