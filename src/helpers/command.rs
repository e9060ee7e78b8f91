use std::{
    ffi::{OsStr, OsString},
    process::Command,
};

/// An argv being assembled for the listing command, possibly nested inside a
/// remote invocation prefix such as `ssh user@host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    program: OsString,
    argv: Vec<OsString>,
}

impl CommandBuilder {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            argv: Vec::new(),
        }
    }

    /// Splits a full command vector into program and arguments.
    /// Returns `None` for an empty vector.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut argv = argv.into_iter();
        let mut builder = Self::new(argv.next()?);
        builder.args(argv);
        Some(builder)
    }

    pub fn build(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.argv);
        command
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.argv.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    /// Runs the current command through `wrapper`, e.g. `ps -ewwF` wrapped with
    /// `ssh ["pi@host"]` becomes `ssh pi@host ps -ewwF`.
    pub fn wrap<S, I, T>(&mut self, wrapper: S, wrapper_args: I) -> &mut Self
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = T>,
        T: AsRef<OsStr>,
    {
        let mut new_argv: Vec<OsString> = wrapper_args
            .into_iter()
            .map(|arg| arg.as_ref().to_owned())
            .collect();

        new_argv.push(self.program.clone());
        new_argv.extend(self.argv.drain(..));

        self.program = wrapper.as_ref().to_owned();
        self.argv = new_argv;
        self
    }

    /// Returns the full argv, program included
    pub fn to_argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(self.argv.iter())
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Returns the command line as a string for logging purposes.
    /// The password following `sshpass -p` is masked.
    pub fn as_command_line(&self) -> String {
        let mut parts = self.to_argv();
        if let Some(pos) = parts.windows(2).position(|w| w[0] == "sshpass" && w[1] == "-p") {
            if let Some(password) = parts.get_mut(pos + 2) {
                *password = "***".to_string();
            }
        }
        shell_words::join(parts)
    }
}
