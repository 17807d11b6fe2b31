//! Reference counting of the system open table.
//!
//! A file must be released exactly once, right after the last handle to it
//! goes away, however the handles were created.

use fdtable::{Pid, Process, SyscallNumber};
use fdtable_grader::Kernel;
use grading::syscall;
use kern::KernelError;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::BTreeSet;

const O_RDONLY: usize = 0;
const OPEN_MAX: i32 = 32;

/// Expected state of one process.
struct Model {
    process: Process,
    open: BTreeSet<i32>,
}

impl Model {
    fn lowest_free(&self) -> Option<i32> {
        (3..OPEN_MAX).find(|fd| !self.open.contains(fd))
    }

    fn pick(&self, rng: &mut StdRng) -> Option<i32> {
        if self.open.is_empty() {
            return None;
        }
        let n = rng.gen_range(0..self.open.len());
        self.open.iter().nth(n).copied()
    }
}

fn handles(models: &[Model]) -> usize {
    models.iter().map(|m| m.open.len()).sum()
}

/// Random open, dup2, close, fork and exit against a model of the tables.
fn run(seed: u64, steps: usize) {
    let kernel = Kernel::boot();
    let (process, mem) = kernel.process();
    let hello = mem.cstr("hello");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut models = vec![Model {
        process,
        open: BTreeSet::new(),
    }];
    let mut releases = 0;

    for step in 0..steps {
        let before = handles(&models);
        let i = rng.gen_range(0..models.len());
        match rng.gen_range(0..10) {
            // open
            0..=2 => {
                let m = &mut models[i];
                match m.lowest_free() {
                    Some(fd) => {
                        assert_eq!(
                            syscall!(m.process, SyscallNumber::Open, hello, O_RDONLY),
                            Ok(fd as usize),
                            "step {step}: open should use the lowest free descriptor."
                        );
                        m.open.insert(fd);
                    }
                    None => assert_eq!(
                        syscall!(m.process, SyscallNumber::Open, hello, O_RDONLY),
                        Err(KernelError::TooManyOpenFile),
                        "step {step}: a full table rejects open."
                    ),
                }
            }
            // dup2
            3..=4 => {
                let m = &mut models[i];
                if let Some(old) = m.pick(&mut rng) {
                    let new = rng.gen_range(3..OPEN_MAX);
                    assert_eq!(
                        syscall!(m.process, SyscallNumber::Dup2, old, new),
                        Ok(new as usize),
                        "step {step}: dup2({old}, {new})"
                    );
                    m.open.insert(new);
                }
            }
            // close
            5..=7 => {
                let m = &mut models[i];
                match m.pick(&mut rng) {
                    Some(fd) => {
                        assert_eq!(syscall!(m.process, SyscallNumber::Close, fd), Ok(0));
                        m.open.remove(&fd);
                    }
                    None => assert_eq!(
                        syscall!(m.process, SyscallNumber::Close, 3),
                        Err(KernelError::BadFileDescriptor),
                        "step {step}: closing an unused descriptor should fail."
                    ),
                }
            }
            // fork
            8 if models.len() < 4 => {
                let m = &mut models[i];
                let child = syscall!(m.process, SyscallNumber::Fork).unwrap();
                let open = m.open.clone();
                models.push(Model {
                    process: kernel.attach(Pid(child), mem.clone()),
                    open,
                });
            }
            // exit
            _ if models.len() > 1 => {
                let mut m = models.swap_remove(i);
                assert_eq!(syscall!(m.process, SyscallNumber::Exit, 0), Ok(0));
            }
            _ => {}
        }

        let after = handles(&models);
        if before > 0 && after == 0 {
            releases += 1;
        }
        assert_eq!(
            kernel.fs.stats("/hello").unwrap().closes,
            releases,
            "step {step}: /hello must be released exactly when its last handle goes away."
        );
        assert_eq!(
            kernel.service.open_entries(),
            (after > 0) as usize,
            "step {step}: every handle shares one entry."
        );
    }

    // Drain everything; the file is released once more if it was open.
    let before = handles(&models);
    for mut m in models {
        assert_eq!(syscall!(m.process, SyscallNumber::Exit, 0), Ok(0));
    }
    if before > 0 {
        releases += 1;
    }
    assert_eq!(kernel.fs.stats("/hello").unwrap().closes, releases);
    assert_eq!(kernel.service.open_entries(), 0);
}

#[test]
fn refcount_random() {
    for seed in 0..16 {
        run(seed, 400);
    }
}

/// Duplicates in several processes all hold the file open.
#[test]
fn refcount_across_processes() {
    let kernel = Kernel::boot();
    let (mut parent, mem) = kernel.process();

    let fd = syscall!(parent, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    syscall!(parent, SyscallNumber::Dup2, fd, 4).unwrap();
    let mut children: Vec<Process> = (0..3)
        .map(|_| {
            let child = syscall!(parent, SyscallNumber::Fork).unwrap();
            kernel.attach(Pid(child), mem.clone())
        })
        .collect();

    assert_eq!(syscall!(parent, SyscallNumber::Close, fd), Ok(0));
    assert_eq!(syscall!(parent, SyscallNumber::Close, 4), Ok(0));
    for child in children.iter_mut() {
        assert_eq!(kernel.fs.stats("/hello").unwrap().closes, 0);
        assert_eq!(syscall!(*child, SyscallNumber::Close, fd), Ok(0));
        assert_eq!(syscall!(*child, SyscallNumber::Close, 4), Ok(0));
    }
    assert_eq!(kernel.fs.stats("/hello").unwrap().closes, 1);
    assert_eq!(kernel.service.open_entries(), 0);
}
