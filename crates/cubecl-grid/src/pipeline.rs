use alloc::vec::Vec;
use std::thread;

/// Number of scratch slots of a core: one is filled while the other is consumed.
pub const BUFFER_NUM: usize = 2;

/// Double buffer over the scratch memory of a core.
///
/// A loader thread fills free slots and hands them to the compute loop through a bounded
/// channel of depth [BUFFER_NUM]; the compute loop hands consumed slots back through a second
/// channel. Both sides block when no slot is available, so at most two jobs are in flight.
pub struct ScratchPipeline<B> {
    slots: Vec<B>,
}

impl<B: Send> ScratchPipeline<B> {
    /// Creates a pipeline whose slots are built by `init`.
    pub fn new(mut init: impl FnMut() -> B) -> Self {
        Self {
            slots: (0..BUFFER_NUM).map(|_| init()).collect(),
        }
    }

    /// Processes every job in order: `load` fills a slot for a job on the loader thread,
    /// `compute` consumes the filled slot on the calling thread.
    ///
    /// Jobs are consumed in the order they are produced.
    pub fn run<J, I, L, C>(&mut self, jobs: I, mut load: L, mut compute: C)
    where
        J: Send,
        I: IntoIterator<Item = J>,
        I::IntoIter: Send,
        L: FnMut(&J, &mut B) + Send,
        C: FnMut(&J, &B),
    {
        let (free_sender, free_receiver) = async_channel::bounded::<B>(BUFFER_NUM);
        let (filled_sender, filled_receiver) = async_channel::bounded::<(J, B)>(BUFFER_NUM);
        let recycled = free_receiver.clone();

        for slot in self.slots.drain(..) {
            if free_sender.try_send(slot).is_err() {
                unreachable!("The free channel holds every slot");
            }
        }

        let jobs = jobs.into_iter();

        thread::scope(|scope| {
            scope.spawn(move || {
                for job in jobs {
                    let Ok(mut slot) = free_receiver.recv_blocking() else {
                        return;
                    };
                    load(&job, &mut slot);
                    if filled_sender.send_blocking((job, slot)).is_err() {
                        return;
                    }
                }
            });

            // Owned by the compute loop so that a panic closes both channels and unblocks
            // the loader.
            let free_sender = free_sender;
            let filled_receiver = filled_receiver;

            while let Ok((job, slot)) = filled_receiver.recv_blocking() {
                compute(&job, &slot);
                if free_sender.try_send(slot).is_err() {
                    unreachable!("At most {BUFFER_NUM} slots exist");
                }
            }
        });

        while let Ok(slot) = recycled.try_recv() {
            self.slots.push(slot);
        }
    }
}
