/*!
    Transport sync handshake.

    The server polls every client before letting the transport roll. While
    it is stopped or starting, the engine first asks the controller to seek
    the timeline to the server's position, then on the next poll checks that
    the timeline actually landed there. Only then does it vote to roll. Once
    the server reports rolling the handshake is abandoned, so a timeline that
    never converges costs a short desync rather than a hang.

    All state is atomic: `on_sync` runs on the realtime thread, resets come
    from the caller thread.
*/

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use transport_types::{TransportState, VideoPosition};

/// Sentinel for "no position"
const NO_POSITION: u64 = u64::MAX;

const IDLE: u8 = 0;
const SEEKING: u8 = 1;
const CONVERGED: u8 = 2;

/**
    Outcome of one sync poll.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncVote {
    /// Let the transport roll.
    Roll,
    /// Hold the transport for another cycle.
    Wait,
}

impl SyncVote {
    pub fn is_roll(self) -> bool {
        self == Self::Roll
    }
}

pub(crate) struct SyncProtocol {
    enabled: AtomicBool,
    counter: AtomicU8,
    /// Seek request waiting to be delivered by the monitor thread.
    pending: AtomicU64,
    /// Last timeline position reported by the controller.
    current: AtomicU64,
}

impl SyncProtocol {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            counter: AtomicU8::new(IDLE),
            pending: AtomicU64::new(NO_POSITION),
            current: AtomicU64::new(NO_POSITION),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.reset();
        }
    }

    /// True while a handshake round is open.
    pub(crate) fn in_progress(&self) -> bool {
        self.counter.load(Ordering::Acquire) != IDLE
    }

    /// Abandon any handshake in progress. Called for every local command.
    pub(crate) fn reset(&self) {
        self.counter.store(IDLE, Ordering::Release);
    }

    pub(crate) fn set_current_position(&self, position: VideoPosition) {
        self.current.store(position.0, Ordering::Release);
    }

    pub(crate) fn current_position(&self) -> Option<VideoPosition> {
        match self.current.load(Ordering::Acquire) {
            NO_POSITION => None,
            position => Some(VideoPosition(position)),
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) != NO_POSITION
    }

    /// Take the seek request raised by the last poll, if any.
    pub(crate) fn take_pending(&self) -> Option<VideoPosition> {
        match self.pending.swap(NO_POSITION, Ordering::AcqRel) {
            NO_POSITION => None,
            position => Some(VideoPosition(position)),
        }
    }

    /**
        One sync poll from the server, with the reported position already
        mapped onto the timeline.
    */
    pub(crate) fn on_sync(&self, state: TransportState, reported: VideoPosition) -> SyncVote {
        if !self.is_enabled() {
            return SyncVote::Roll;
        }
        let observed = self.counter.load(Ordering::Acquire);
        self.advance(observed, state, reported)
    }

    /**
        Moves the counter on from `observed`. A local command that resets
        the counter after it was read wins: the poll votes to wait and the
        next one starts a fresh round.
    */
    fn advance(&self, observed: u8, state: TransportState, reported: VideoPosition) -> SyncVote {
        let next = match state {
            TransportState::Rolling => {
                self.reset();
                return SyncVote::Roll;
            }
            TransportState::Stopped | TransportState::Starting => match observed {
                IDLE => SEEKING,
                SEEKING if self.current.load(Ordering::Acquire) == reported.0 => CONVERGED,
                SEEKING => IDLE,
                other => other,
            },
        };

        let (stored, vote) = if next >= CONVERGED {
            (IDLE, SyncVote::Roll)
        } else {
            (next, SyncVote::Wait)
        };

        let requests_seek = observed == IDLE && next == SEEKING;
        if requests_seek {
            self.pending.store(reported.0, Ordering::Release);
        }

        if self
            .counter
            .compare_exchange(observed, stored, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if requests_seek {
                let _ = self.pending.compare_exchange(
                    reported.0,
                    NO_POSITION,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
            return SyncVote::Wait;
        }

        vote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use TransportState::{Rolling, Starting, Stopped};

    #[test]
    fn disabled_passes_through() {
        let sync = SyncProtocol::new(false);
        assert_eq!(sync.on_sync(Stopped, VideoPosition(10)), SyncVote::Roll);
        assert!(!sync.has_pending());
        assert!(!sync.in_progress());
    }

    #[test]
    fn first_poll_requests_seek() {
        let sync = SyncProtocol::new(true);
        assert_eq!(sync.on_sync(Starting, VideoPosition(250)), SyncVote::Wait);
        assert!(sync.in_progress());
        assert_eq!(sync.take_pending(), Some(VideoPosition(250)));
        assert_eq!(sync.take_pending(), None);
    }

    #[test]
    fn converges_in_two_rounds() {
        let sync = SyncProtocol::new(true);
        let script = [Stopped, Stopped, Stopped, Rolling];
        let mut rolled_at = None;

        for (round, state) in script.into_iter().enumerate() {
            let vote = sync.on_sync(state, VideoPosition(100));
            // controller follows every seek request
            if let Some(position) = sync.take_pending() {
                sync.set_current_position(position);
            }
            if vote.is_roll() {
                rolled_at = Some(round);
                break;
            }
        }

        assert_eq!(rolled_at, Some(1));
        assert!(!sync.in_progress());
    }

    #[test]
    fn mismatch_restarts_handshake() {
        let sync = SyncProtocol::new(true);
        sync.set_current_position(VideoPosition(5));

        assert_eq!(sync.on_sync(Stopped, VideoPosition(100)), SyncVote::Wait);
        sync.take_pending();
        // timeline never moved
        assert_eq!(sync.on_sync(Stopped, VideoPosition(100)), SyncVote::Wait);
        assert!(!sync.in_progress());

        // next round asks again
        assert_eq!(sync.on_sync(Stopped, VideoPosition(100)), SyncVote::Wait);
        assert_eq!(sync.take_pending(), Some(VideoPosition(100)));
    }

    #[test]
    fn rolling_always_wins() {
        let sync = SyncProtocol::new(true);
        let positions = [10, 20, 30];
        for position in positions {
            assert_eq!(sync.on_sync(Stopped, VideoPosition(position)), SyncVote::Wait);
        }
        assert_eq!(sync.on_sync(Rolling, VideoPosition(40)), SyncVote::Roll);
        assert!(!sync.in_progress());
    }

    #[test]
    fn non_converging_script_terminates_at_rolling() {
        let sync = SyncProtocol::new(true);
        let script = [
            (Stopped, 10),
            (Stopped, 11),
            (Stopped, 12),
            (Rolling, 13),
        ];
        let votes: Vec<_> = script
            .iter()
            .map(|&(state, position)| sync.on_sync(state, VideoPosition(position)))
            .collect();

        assert_eq!(
            votes,
            [SyncVote::Wait, SyncVote::Wait, SyncVote::Wait, SyncVote::Roll]
        );
    }

    #[test]
    fn reset_abandons_handshake() {
        let sync = SyncProtocol::new(true);
        sync.on_sync(Starting, VideoPosition(7));
        assert!(sync.in_progress());
        sync.reset();
        assert!(!sync.in_progress());
    }

    #[test]
    fn reset_during_poll_is_not_overwritten() {
        let sync = SyncProtocol::new(true);
        sync.on_sync(Starting, VideoPosition(7));
        sync.take_pending();
        sync.set_current_position(VideoPosition(7));

        // a seek lands between the poll reading the counter and storing it
        let observed = sync.counter.load(Ordering::Acquire);
        sync.reset();
        assert_eq!(sync.advance(observed, Starting, VideoPosition(7)), SyncVote::Wait);
        assert!(!sync.in_progress());

        // the next poll opens a fresh round
        assert_eq!(sync.on_sync(Starting, VideoPosition(9)), SyncVote::Wait);
        assert_eq!(sync.take_pending(), Some(VideoPosition(9)));
    }

    #[test]
    fn disabling_resets() {
        let sync = SyncProtocol::new(true);
        sync.on_sync(Starting, VideoPosition(7));
        sync.set_enabled(false);
        assert!(!sync.in_progress());
        assert!(!sync.is_enabled());
    }

    #[test]
    fn current_position_starts_unknown() {
        let sync = SyncProtocol::new(true);
        assert_eq!(sync.current_position(), None);
        sync.set_current_position(VideoPosition(3));
        assert_eq!(sync.current_position(), Some(VideoPosition(3)));
    }
}
