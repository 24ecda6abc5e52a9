use std::{
    env, fs,
    ops::Deref,
    path::{Path, PathBuf},
    process,
};

/// Scratch directory under the system temp dir, removed on drop.  The name is
/// suffixed with the process id so parallel test binaries don't collide.
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new<P: AsRef<Path>>(name: P) -> Self {
        let mut dir_name = name.as_ref().as_os_str().to_owned();
        dir_name.push(format!("-{}", process::id()));
        let path = env::temp_dir().join(dir_name);
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    /// Names of the entries currently in the directory, sorted.
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.0)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Deref for TempDir {
    type Target = PathBuf;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}
