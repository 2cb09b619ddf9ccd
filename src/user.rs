//! Account creation on the target system.

use anyhow::{ensure, Result};
use std::collections::BTreeSet;
use std::path::Path;

use crate::process::Cmd;
use crate::prompt::Prompt;

pub(crate) const PWD_MKDB: &str = "/usr/sbin/pwd_mkdb";
pub(crate) const USERADD: &str = "/usr/sbin/useradd";
pub(crate) const CHROOT: &str = "/usr/sbin/chroot";
pub(crate) const PASSWD: &str = "/usr/bin/passwd";

/// Login shell for new accounts.
pub const DEFAULT_SHELL: &str = "/bin/ksh";

/// Group granting administrative rights.
pub const ADMIN_GROUP: &str = "wheel";

/// A user account to create on the target system.
#[derive(Debug, Clone)]
pub struct User {
    username: String,
    groups: BTreeSet<String>,
    shell: String,
    full_name: String,
}

impl User {
    /// Create a user; the name must not be empty.
    pub fn new(username: &str) -> Result<Self> {
        ensure!(!username.is_empty(), "username must not be empty");
        Ok(Self {
            username: username.to_string(),
            groups: BTreeSet::new(),
            shell: DEFAULT_SHELL.to_string(),
            full_name: String::new(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Add this user to a group.
    pub fn add_group(&mut self, group: &str) {
        self.groups.insert(group.to_string());
    }

    pub fn set_full_name(&mut self, full_name: &str) {
        self.full_name = full_name.to_string();
    }

    /// GECOS string: the full name followed by the three unused fields.
    pub fn gecos(&self) -> String {
        [self.full_name.as_str(), "", "", ""].join(",")
    }

    /// Argument list for useradd(8).
    pub(crate) fn useradd_args(&self) -> Vec<String> {
        let groups: Vec<&str> = self.groups.iter().map(String::as_str).collect();
        vec![
            "-m".to_string(),
            "-k".to_string(),
            "/etc/skel".to_string(),
            "-c".to_string(),
            self.gecos(),
            "-s".to_string(),
            self.shell.clone(),
            "-G".to_string(),
            groups.join(","),
            self.username.clone(),
        ]
    }
}

/// Build the password databases inside the target root.
pub fn install_user_database(root: &Path) -> Result<()> {
    Cmd::new(PWD_MKDB)
        .args(["-p", "-d"])
        .arg_path(&root.join("etc"))
        .arg("/etc/master.passwd")
        .error_msg("building the password database failed")
        .run()?;
    Ok(())
}

/// Create the account with useradd(8) inside the target root.
pub fn create_user(root: &Path, user: &User) -> Result<()> {
    Cmd::new(CHROOT)
        .arg_path(root)
        .arg(USERADD)
        .args(user.useradd_args())
        .error_msg(format!("creating user '{}' failed", user.username()))
        .run()?;
    Ok(())
}

/// Let the operator set the account password, chrooted into the target.
pub fn set_password(root: &Path, username: &str) -> Result<()> {
    Cmd::new(CHROOT)
        .arg_path(root)
        .arg(PASSWD)
        .arg(username)
        .error_msg(format!("setting the password for '{username}' failed"))
        .run_interactive()?;
    Ok(())
}

/// Interactive account setup: prompt for a name, create the account in the
/// administrative group, then hand the terminal to passwd(1).
pub fn setup(prompt: &mut dyn Prompt, root: &Path) -> Result<()> {
    let mut username = String::new();
    while username.is_empty() {
        username = prompt.ask("username> ")?.trim().to_string();
    }

    let mut user = User::new(&username)?;
    user.add_group(ADMIN_GROUP);

    install_user_database(root)?;
    create_user(root, &user)?;
    set_password(root, user.username())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_username_is_rejected() {
        assert!(User::new("").is_err());
    }

    #[test]
    fn gecos_pads_the_unused_fields() {
        let mut user = User::new("puffy").unwrap();
        assert_eq!(user.gecos(), ",,,");
        user.set_full_name("Puffy Fish");
        assert_eq!(user.gecos(), "Puffy Fish,,,");
    }

    #[test]
    fn useradd_args_carry_home_skeleton_shell_and_groups() {
        let mut user = User::new("puffy").unwrap();
        user.add_group(ADMIN_GROUP);
        let args = user.useradd_args();
        assert_eq!(
            args,
            vec![
                "-m", "-k", "/etc/skel", "-c", ",,,", "-s", "/bin/ksh", "-G", "wheel", "puffy"
            ]
        );
    }
}
