/// Container init bootstrap (dry run)
///
/// Walks the same checks the in-container init performs before it execs the
/// user process, in the same order, talking to the parent over the sync
/// pipe. Nothing is applied to the calling process: no exec, unshare, mount
/// or credential change. The result is the exec that would have happened.
use crate::config::runtime::{NamespaceType, Rlimit, RuntimeConfig, RLIMIT_TYPES};
use crate::config::types::{Result, RuntimeError};
use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::getppid;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
const PASSWD_PATH: &str = "/etc/passwd";
const GROUP_PATH: &str = "/etc/group";

/// Capability names the kernel knows, indexed by capability number.
pub const CAPABILITY_NAMES: &[&str] = &[
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_DAC_READ_SEARCH",
    "CAP_FOWNER",
    "CAP_FSETID",
    "CAP_KILL",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETPCAP",
    "CAP_LINUX_IMMUTABLE",
    "CAP_NET_BIND_SERVICE",
    "CAP_NET_BROADCAST",
    "CAP_NET_ADMIN",
    "CAP_NET_RAW",
    "CAP_IPC_LOCK",
    "CAP_IPC_OWNER",
    "CAP_SYS_MODULE",
    "CAP_SYS_RAWIO",
    "CAP_SYS_CHROOT",
    "CAP_SYS_PTRACE",
    "CAP_SYS_PACCT",
    "CAP_SYS_ADMIN",
    "CAP_SYS_BOOT",
    "CAP_SYS_NICE",
    "CAP_SYS_RESOURCE",
    "CAP_SYS_TIME",
    "CAP_SYS_TTY_CONFIG",
    "CAP_MKNOD",
    "CAP_LEASE",
    "CAP_AUDIT_WRITE",
    "CAP_AUDIT_CONTROL",
    "CAP_SETFCAP",
    "CAP_MAC_OVERRIDE",
    "CAP_MAC_ADMIN",
    "CAP_SYSLOG",
    "CAP_WAKE_ALARM",
    "CAP_BLOCK_SUSPEND",
    "CAP_AUDIT_READ",
    "CAP_PERFMON",
    "CAP_BPF",
    "CAP_CHECKPOINT_RESTORE",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub bounding: Vec<String>,
    pub effective: Vec<String>,
    pub inheritable: Vec<String>,
    pub permitted: Vec<String>,
    pub ambient: Vec<String>,
}

crate::generate_record!(Capabilities {
    bounding,
    effective,
    inheritable,
    permitted,
    ambient,
});

impl Capabilities {
    fn sets(&self) -> [(&'static str, &[String]); 5] {
        [
            ("bounding", self.bounding.as_slice()),
            ("effective", self.effective.as_slice()),
            ("inheritable", self.inheritable.as_slice()),
            ("permitted", self.permitted.as_slice()),
            ("ambient", self.ambient.as_slice()),
        ]
    }
}

/// Everything the init process receives from its parent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitConfig {
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    /// `""`, `uid`, `uid:gid`, `name` or `name:group`
    pub user: String,
    pub additional_groups: Vec<String>,
    pub capabilities: Option<Capabilities>,
    pub rlimits: Vec<Rlimit>,
    pub no_new_privileges: bool,
    pub process_label: String,
    pub apparmor_profile: String,
    pub create_console: bool,
    pub console_width: u16,
    pub console_height: u16,
    pub config: RuntimeConfig,
}

crate::generate_record!(InitConfig {
    args,
    env,
    cwd,
    user,
    additional_groups,
    capabilities,
    rlimits,
    no_new_privileges,
    process_label,
    apparmor_profile,
    create_console,
    console_width,
    console_height,
    config,
});

/// Message exchanged over the sync pipe, one JSON object per line.
#[derive(Debug, Serialize, Deserialize)]
struct SyncMessage {
    #[serde(rename = "type")]
    kind: String,
}

const PROC_READY: &str = "procReady";
const PROC_RUN: &str = "procRun";

#[derive(Debug, Serialize)]
struct ConsoleSize {
    height: u16,
    width: u16,
}

/// The exec init would perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecPlan {
    pub path: PathBuf,
    pub argv: Vec<String>,
    pub env: Vec<String>,
    pub cwd: PathBuf,
    pub uid: u32,
    pub gid: u32,
    pub additional_gids: Vec<u32>,
}

#[derive(Debug)]
pub struct StandardInit {
    /// Sync channel to the parent
    pub pipe: File,
    pub console_socket: File,
    pub parent_pid: i32,
    pub config: InitConfig,
    pub fifo_fd: RawFd,
}

impl StandardInit {
    pub fn init(self) -> Result<ExecPlan> {
        let ppid = getppid().as_raw();
        if ppid != self.parent_pid {
            return Err(RuntimeError::Init(format!(
                "parent died: expected parent {}, found {}",
                self.parent_pid, ppid
            )));
        }

        if self.fifo_fd < 0 {
            return Err(RuntimeError::Init(format!("invalid fifo fd {}", self.fifo_fd)));
        }
        fcntl(self.fifo_fd, FcntlArg::F_GETFD).map_err(|e| {
            RuntimeError::Init(format!("fifo fd {} is not open: {}", self.fifo_fd, e))
        })?;

        validate_env(&self.config.env)?;

        let group_db = read_db(GROUP_PATH);
        let (uid, gid) = resolve_user(&self.config.user, &read_db(PASSWD_PATH), &group_db)?;
        let additional_gids = self
            .config
            .additional_groups
            .iter()
            .map(|group| resolve_group(group, &group_db))
            .collect::<Result<Vec<_>>>()?;

        if let Some(caps) = &self.config.capabilities {
            validate_capabilities(caps)?;
        }

        for rlimit in &self.config.rlimits {
            if !RLIMIT_TYPES.contains(&rlimit.kind.as_str()) {
                return Err(RuntimeError::Init(format!("unknown rlimit {:?}", rlimit.kind)));
            }
            if rlimit.soft > rlimit.hard {
                return Err(RuntimeError::Init(format!(
                    "{} soft limit {} exceeds hard limit {}",
                    rlimit.kind, rlimit.soft, rlimit.hard
                )));
            }
        }

        let runtime = &self.config.config;
        if !runtime.hostname.is_empty() && !runtime.has_namespace(NamespaceType::Uts) {
            return Err(RuntimeError::Init(
                "unable to set hostname without a private UTS namespace".to_string(),
            ));
        }

        if self.config.create_console {
            let size = ConsoleSize {
                height: self.config.console_height,
                width: self.config.console_width,
            };
            let mut socket = &self.console_socket;
            serde_json::to_writer(&mut socket, &size)?;
            socket.write_all(b"\n")?;
        }

        self.sync_with_parent()?;

        let cwd = match self.config.cwd.as_str() {
            "" => PathBuf::from("/"),
            cwd if Path::new(cwd).is_absolute() => PathBuf::from(cwd),
            cwd => {
                return Err(RuntimeError::Init(format!("cwd {:?} must be absolute", cwd)));
            }
        };

        let argv = self.config.args;
        let program = argv
            .first()
            .ok_or_else(|| RuntimeError::Init("no process arguments".to_string()))?;
        let path = resolve_executable(program, &self.config.env)?;

        Ok(ExecPlan {
            path,
            argv,
            env: self.config.env,
            cwd,
            uid,
            gid,
            additional_gids,
        })
    }

    /// Tell the parent we are ready and wait for the go-ahead.
    fn sync_with_parent(&self) -> Result<()> {
        let mut pipe = &self.pipe;
        serde_json::to_writer(
            &mut pipe,
            &SyncMessage {
                kind: PROC_READY.to_string(),
            },
        )?;
        pipe.write_all(b"\n")?;

        let mut line = String::new();
        if BufReader::new(&self.pipe).read_line(&mut line)? == 0 {
            return Err(RuntimeError::Init(
                "sync: parent closed the pipe before procRun".to_string(),
            ));
        }
        let message: SyncMessage = serde_json::from_str(line.trim_end())?;
        if message.kind != PROC_RUN {
            return Err(RuntimeError::Init(format!(
                "sync: expected {}, got {:?}",
                PROC_RUN, message.kind
            )));
        }
        Ok(())
    }
}

fn validate_env(env: &[String]) -> Result<()> {
    for entry in env {
        match entry.split_once('=') {
            Some((key, _)) if !key.is_empty() && !entry.contains('\0') => {}
            _ => {
                return Err(RuntimeError::Init(format!("invalid environment entry {:?}", entry)));
            }
        }
    }
    Ok(())
}

fn validate_capabilities(caps: &Capabilities) -> Result<()> {
    for (set, names) in caps.sets() {
        if let Some(unknown) = names
            .iter()
            .find(|name| !CAPABILITY_NAMES.contains(&name.as_str()))
        {
            return Err(RuntimeError::Init(format!(
                "unknown capability {:?} in {} set",
                unknown, set
            )));
        }
    }
    Ok(())
}

/// Missing databases read as empty; only name lookups need them.
fn read_db(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

fn lookup_passwd(passwd: &str, name: &str) -> Option<(u32, u32)> {
    passwd.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(':').collect();
        match fields.as_slice() {
            [user, _, uid, gid, ..] if *user == name => {
                Some((uid.parse().ok()?, gid.parse().ok()?))
            }
            _ => None,
        }
    })
}

fn lookup_group(group: &str, name: &str) -> Option<u32> {
    group.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(':').collect();
        match fields.as_slice() {
            [group, _, gid, ..] if *group == name => gid.parse().ok(),
            _ => None,
        }
    })
}

fn resolve_group(spec: &str, group_db: &str) -> Result<u32> {
    spec.parse::<u32>()
        .ok()
        .or_else(|| lookup_group(group_db, spec))
        .ok_or_else(|| RuntimeError::Init(format!("unable to find group {:?}", spec)))
}

/// Resolve a user spec to `(uid, gid)`.
fn resolve_user(spec: &str, passwd: &str, group_db: &str) -> Result<(u32, u32)> {
    if spec.is_empty() {
        return Ok((0, 0));
    }
    let (user, group) = match spec.split_once(':') {
        Some((user, group)) => (user, Some(group)),
        None => (spec, None),
    };

    let (uid, default_gid) = match user.parse::<u32>() {
        Ok(uid) => (uid, 0),
        Err(_) => lookup_passwd(passwd, user)
            .ok_or_else(|| RuntimeError::Init(format!("unable to find user {:?}", user)))?,
    };
    let gid = match group {
        Some(group) => resolve_group(group, group_db)?,
        None => default_gid,
    };
    Ok((uid, gid))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Resolve `program` the way `execvp` would, using the container's `PATH`.
fn resolve_executable(program: &str, env: &[String]) -> Result<PathBuf> {
    if program.is_empty() {
        return Err(RuntimeError::Init("empty executable name".to_string()));
    }
    if program.contains('/') {
        return Ok(PathBuf::from(program));
    }
    let search = env
        .iter()
        .rev()
        .find_map(|entry| entry.strip_prefix("PATH="))
        .unwrap_or(DEFAULT_PATH);
    search
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| {
            RuntimeError::Init(format!("executable {:?} not found in $PATH", program))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::runtime::Namespace;
    use std::io::Read;
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;

    fn stream_file(stream: UnixStream) -> File {
        File::from(OwnedFd::from(stream))
    }

    fn base_config() -> InitConfig {
        InitConfig {
            args: vec!["/bin/true".to_string()],
            env: vec!["PATH=/bin".to_string()],
            ..InitConfig::default()
        }
    }

    fn standard_init(config: InitConfig) -> (StandardInit, UnixStream, UnixStream) {
        let (pipe, parent) = UnixStream::pair().unwrap();
        let (console, console_peer) = UnixStream::pair().unwrap();
        let init = StandardInit {
            pipe: stream_file(pipe),
            console_socket: stream_file(console),
            parent_pid: getppid().as_raw(),
            config,
            fifo_fd: 2,
        };
        (init, parent, console_peer)
    }

    #[test]
    fn test_init_succeeds_after_proc_run() {
        let (init, mut parent, _console) = standard_init(base_config());
        parent.write_all(b"{\"type\":\"procRun\"}\n").unwrap();

        let plan = init.init().unwrap();
        assert_eq!(plan.path, PathBuf::from("/bin/true"));
        assert_eq!(plan.cwd, PathBuf::from("/"));
        assert_eq!((plan.uid, plan.gid), (0, 0));

        let mut buf = [0u8; 21];
        parent.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"{\"type\":\"procReady\"}\n");
    }

    #[test]
    fn test_init_fails_when_parent_closes_pipe() {
        let (init, parent, _console) = standard_init(base_config());
        parent.shutdown(std::net::Shutdown::Write).unwrap();
        let err = init.init().unwrap_err();
        assert!(err.to_string().contains("sync"), "{err}");
    }

    #[test]
    fn test_init_rejects_wrong_sync_message() {
        let (init, mut parent, _console) = standard_init(base_config());
        parent.write_all(b"{\"type\":\"procHooks\"}\n").unwrap();
        assert!(init.init().is_err());
    }

    #[test]
    fn test_wrong_parent_fails_before_sync() {
        let (mut init, _parent, _console) = standard_init(base_config());
        init.parent_pid = -1;
        assert!(init.init().is_err());
    }

    #[test]
    fn test_closed_fifo_fd() {
        let (mut init, _parent, _console) = standard_init(base_config());
        init.fifo_fd = 4000;
        let err = init.init().unwrap_err();
        assert!(err.to_string().contains("fifo"), "{err}");
    }

    #[test]
    fn test_console_size_is_sent() {
        let mut config = base_config();
        config.create_console = true;
        config.console_width = 80;
        config.console_height = 24;
        let (init, mut parent, mut console) = standard_init(config);
        parent.write_all(b"{\"type\":\"procRun\"}\n").unwrap();
        init.init().unwrap();

        let mut line = String::new();
        BufReader::new(&mut console).read_line(&mut line).unwrap();
        assert_eq!(line, "{\"height\":24,\"width\":80}\n");
    }

    #[test]
    fn test_hostname_needs_uts() {
        let mut config = base_config();
        config.config.hostname = "box".to_string();
        let (init, mut parent, _console) = standard_init(config.clone());
        parent.write_all(b"{\"type\":\"procRun\"}\n").unwrap();
        assert!(init.init().is_err());

        config.config.namespaces = vec![Namespace::new(NamespaceType::Uts)];
        let (init, mut parent, _console) = standard_init(config);
        parent.write_all(b"{\"type\":\"procRun\"}\n").unwrap();
        init.init().unwrap();
    }

    #[test]
    fn test_validation_errors() {
        let mut bad_env = base_config();
        bad_env.env.push("=value".to_string());
        let mut bad_cap = base_config();
        bad_cap.capabilities = Some(Capabilities {
            ambient: vec!["CAP_MAKE_COFFEE".to_string()],
            ..Capabilities::default()
        });
        let mut bad_rlimit = base_config();
        bad_rlimit.rlimits.push(Rlimit {
            kind: "RLIMIT_NOFILE".to_string(),
            hard: 1,
            soft: 2,
        });
        let mut bad_cwd = base_config();
        bad_cwd.cwd = "relative".to_string();
        let mut no_args = base_config();
        no_args.args.clear();

        for config in [bad_env, bad_cap, bad_rlimit, bad_cwd, no_args] {
            let (init, mut parent, _console) = standard_init(config);
            parent.write_all(b"{\"type\":\"procRun\"}\n").unwrap();
            assert!(init.init().is_err());
        }
    }

    #[test]
    fn test_user_resolution() {
        let passwd = "root:x:0:0:root:/root:/bin/sh\nnobody:x:65534:65534::/:/sbin/nologin\n";
        let group = "root:x:0:\nwheel:x:10:root\n";
        assert_eq!(resolve_user("", passwd, group).unwrap(), (0, 0));
        assert_eq!(resolve_user("1000", passwd, group).unwrap(), (1000, 0));
        assert_eq!(resolve_user("1000:50", passwd, group).unwrap(), (1000, 50));
        assert_eq!(resolve_user("nobody", passwd, group).unwrap(), (65534, 65534));
        assert_eq!(resolve_user("nobody:wheel", passwd, group).unwrap(), (65534, 10));
        assert!(resolve_user("ghost", passwd, group).is_err());
        assert!(resolve_user("0:ghosts", passwd, group).is_err());
    }

    #[test]
    fn test_resolve_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool");
        fs::write(&exe, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        let plain = dir.path().join("data");
        fs::write(&plain, b"").unwrap();

        let env = vec![format!("PATH=/nonexistent:{}", dir.path().display())];
        assert_eq!(resolve_executable("tool", &env).unwrap(), exe);
        assert!(resolve_executable("data", &env).is_err());
        assert_eq!(
            resolve_executable("./rel/x", &env).unwrap(),
            PathBuf::from("./rel/x")
        );
        assert!(resolve_executable("", &env).is_err());
    }
}
