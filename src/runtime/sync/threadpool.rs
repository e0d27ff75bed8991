use std::fmt::{Display, Formatter, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
  NewJob(Job),
  Terminate,
}

struct Worker {
  id: usize,
  thread: Option<JoinHandle<()>>,
}

impl Worker {
  fn new(id: usize, receiver: Arc<Mutex<Receiver<Message>>>) -> std::io::Result<Worker> {
    let thread = thread::Builder::new()
      .name(format!("crossroute-worker-{}", id))
      .spawn(move || {
        loop {
          // The guard must drop before the job runs so other workers can pick up work.
          let message = match receiver.lock() {
            Ok(lock) => lock.recv(),
            Err(_) => break,
          };
          match message {
            Ok(Message::NewJob(job)) => {
              if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!(worker = id, "job panicked; worker keeps serving");
              }
            }
            Ok(Message::Terminate) | Err(_) => break,
          }
        }
        tracing::trace!(worker = id, "worker stopped");
      })?;
    Ok(Worker {
      id,
      thread: Some(thread),
    })
  }
}

/// Fixed-size pool running connection jobs for the blocking server.
pub struct ThreadPool {
  workers: Vec<Worker>,
  sender: Sender<Message>,
}

impl Display for ThreadPool {
  fn fmt(&self, f: &mut Formatter) -> Result {
    write!(f, "ThreadPool {}", self.workers.len())
  }
}

impl ThreadPool {
  /// Spawns `size` workers (at least one).
  pub fn new(size: usize) -> std::io::Result<ThreadPool> {
    let (sender, receiver) = channel();
    let receiver = Arc::new(Mutex::new(receiver));
    let workers = (0..size.max(1))
      .map(|id| Worker::new(id, Arc::clone(&receiver)))
      .collect::<std::io::Result<Vec<_>>>()?;
    Ok(ThreadPool { workers, sender })
  }

  pub fn size(&self) -> usize {
    self.workers.len()
  }

  pub fn run<F>(&self, job: F)
  where
    F: FnOnce() + Send + 'static,
  {
    if self.sender.send(Message::NewJob(Box::new(job))).is_err() {
      tracing::warn!("thread pool is stopped, dropping job");
    }
  }

  pub fn stop(&mut self) {
    for _ in &self.workers {
      let _ = self.sender.send(Message::Terminate);
    }
    for worker in &mut self.workers {
      if let Some(thread) = worker.thread.take() {
        if thread.join().is_err() {
          tracing::error!(worker = worker.id, "worker panicked");
        }
      }
    }
  }
}

impl Drop for ThreadPool {
  fn drop(&mut self) {
    self.stop();
  }
}
