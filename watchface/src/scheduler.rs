use std::{sync::Arc, time::Duration};

use chrono::{Local, NaiveTime};
use log::{debug, error, info, warn};
use tokio::{
    sync::{mpsc, oneshot},
    task::{spawn_blocking, JoinHandle},
    time::{interval, timeout, MissedTickBehavior},
};

use crate::{apps::App, face::Face, Error, Result};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

enum Command {
    Launch(Vec<App>, oneshot::Sender<Result<()>>),
    Shutdown,
}

/// Talks to a running [`Scheduler`]. Cheap to clone.
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::Sender<Command>,
}

impl Handle {
    /// Replaces the running apps, once in-flight renders are done.
    pub async fn launch(&self, apps: Vec<App>) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.tx.send(Command::Launch(apps, done)).await.map_err(|_| Error::SchedulerGone)?;
        rx.await.map_err(|_| Error::SchedulerGone)?
    }

    /// Asks the scheduler to stop; [`Scheduler::run`] then returns the face.
    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!("[scheduler] already stopped");
        }
    }
}

/// Ticks at a fixed period and lets each app decide whether to redraw.
///
/// Every tick starts one task per app. An app whose previous task is still
/// running sits the tick out, so a slow app never piles up work.
pub struct Scheduler<B> {
    face: Arc<Face<B>>,
    apps: Vec<App>,
    period: Duration,
    deadline: Duration,
    clock: fn() -> NaiveTime,
    inflight: Vec<(App, JoinHandle<()>)>,
    rx: mpsc::Receiver<Command>,
}

fn wall_clock() -> NaiveTime {
    Local::now().time()
}

impl<B> Scheduler<B>
where
    B: AsRef<[u8]> + AsMut<[u8]> + Send + 'static,
{
    pub fn new(face: Face<B>, period: Duration) -> (Self, Handle) {
        let (tx, rx) = mpsc::channel(4);
        let scheduler = Self {
            face: Arc::new(face),
            apps: Vec::new(),
            period,
            deadline: period.mul_f32(0.8),
            clock: wall_clock,
            inflight: Vec::new(),
            rx,
        };
        (scheduler, Handle { tx })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> NaiveTime) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn face(&self) -> &Face<B> {
        &self.face
    }

    /// Waits for every outstanding render.
    async fn quiesce(&mut self) {
        for (app, task) in self.inflight.drain(..) {
            if let Err(e) = task.await {
                error!("[scheduler] {app} task died: {e}");
            }
        }
    }

    /// Swaps in `apps`: drains in-flight renders, registers the new regions,
    /// then paints each app once. Registration errors keep the old apps.
    pub async fn launch(&mut self, apps: Vec<App>) -> Result<()> {
        self.quiesce().await;
        let regions: Vec<_> = apps.iter().map(App::region).collect();
        self.face.replace_regions(&regions)?;
        self.apps = apps;

        let face = self.face.clone();
        let apps = self.apps.clone();
        let now = (self.clock)();
        spawn_blocking(move || {
            for app in &apps {
                match app.initialize(&face, now) {
                    Ok(()) => debug!("[scheduler] {app} initialized"),
                    Err(e) => warn!("[scheduler] {app} initial draw skipped: {e}"),
                }
            }
        })
        .await
        .map_err(|e| Error::Render { region: "*", reason: e.to_string() })?;

        let names: Vec<_> = self.apps.iter().map(App::to_string).collect();
        info!("[scheduler] launched {names:?}");
        Ok(())
    }

    fn tick(&mut self) {
        self.inflight.retain(|(_, task)| !task.is_finished());
        let now = (self.clock)();
        for app in &self.apps {
            if self.inflight.iter().any(|(busy, _)| busy == app) {
                warn!("[scheduler] {app} still rendering, skipping this tick");
                continue;
            }
            let task = tokio::spawn(render(self.face.clone(), app.clone(), now, self.deadline));
            self.inflight.push((app.clone(), task));
        }
    }

    /// Runs until [`Handle::shutdown`], then joins all renders and hands the
    /// face back. Once every handle is dropped it keeps ticking, for good.
    pub async fn run(mut self) -> Result<Face<B>> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("[scheduler] ticking every {:?}", self.period);
        let mut listening = true;
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                cmd = self.rx.recv(), if listening => match cmd {
                    Some(Command::Launch(apps, done)) => {
                        let res = self.launch(apps).await;
                        if let Err(e) = &res {
                            error!("[scheduler] launch failed: {e}");
                        }
                        let _ = done.send(res);
                    }
                    Some(Command::Shutdown) => break,
                    None => {
                        warn!("[scheduler] no handles left, ticking without commands");
                        listening = false;
                    }
                },
            }
        }

        info!("[scheduler] stopping, {} render(s) in flight", self.inflight.len());
        self.quiesce().await;
        let Self { face, .. } = self;
        Arc::try_unwrap(face).map_err(|face| Error::FaceBusy(Arc::strong_count(&face) - 1))
    }
}

/// One app's tick. The blocking work cannot be cancelled, so on overrun it
/// is still waited for; that keeps the app marked busy until it finishes.
async fn render<B>(face: Arc<Face<B>>, app: App, now: NaiveTime, deadline: Duration)
where
    B: AsRef<[u8]> + AsMut<[u8]> + Send + 'static,
{
    let name = app.to_string();
    let mut work = spawn_blocking(move || app.render(&face, now));
    let res = match timeout(deadline, &mut work).await {
        Ok(res) => res,
        Err(_) => {
            warn!("[scheduler] {name} overran {deadline:?}");
            work.await
        }
    };
    match res {
        Ok(Ok(true)) => debug!("[scheduler] {name} redrawn"),
        Ok(Ok(false)) => {}
        Ok(Err(e)) if e.is_recoverable() => warn!("[scheduler] {name} skipped: {e}"),
        Ok(Err(e)) => error!("[scheduler] {name}: {e}"),
        Err(e) => error!("[scheduler] {name} panicked: {e}"),
    }
}
