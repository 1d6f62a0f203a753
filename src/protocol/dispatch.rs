//! Ties the line buffer and tokenizer to the fifteen three-letter commands
//! and owns the "frame currently being filled" cursor.

use core::fmt::Write as _;

use arrayvec::ArrayString;

use crate::error::NakCode;
use crate::frame::ROW_HEX_LEN;
use crate::matrix::{MatrixDriver, Rotation};
use crate::pool::AnimationPool;
use crate::power::{CurrentBudget, PowerController};
use crate::prefs::{pack_color_correction, PrefKey, PreferenceStore};
use crate::protocol::line::{LineBuffer, LineEvent};
use crate::protocol::token::tokenize;
use crate::FIRMWARE_VERSION;

/// Upper bound on one `ACK`/`NAK` response line. `QUE` against a full
/// animation pool is the long pole, at well under half of this.
pub const RESPONSE_CAPACITY: usize = 512;
pub type Response = ArrayString<RESPONSE_CAPACITY>;

/// Every piece of long-lived state a command handler might touch, borrowed
/// for the duration of a single dispatched line.
pub struct DispatchContext<'a, P: PreferenceStore> {
    pub pool: &'a mut AnimationPool,
    pub matrix: &'a mut MatrixDriver,
    pub power: &'a mut PowerController,
    pub prefs: &'a mut P,
    pub now_ms: u32,
}

/// Line-buffered parser plus the "frame armed" cursor: once a `FRM` has
/// allocated a slot, `RGB` lines append to it until it's full or a `FRM`,
/// `DON`, or `ANM` seals it.
pub struct Dispatcher {
    line: LineBuffer,
    frame_armed: bool,
    /// Set by `RST`; the main loop clears the physical strip once it
    /// observes this and resets the flag — the dispatcher itself never
    /// touches a [`crate::matrix::LedStrip`].
    pub matrix_clear_pending: bool,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Dispatcher {
            line: LineBuffer::new(),
            frame_armed: false,
            matrix_clear_pending: false,
        }
    }

    /// Feeds one transport byte. Returns the response line to send back,
    /// exactly when a complete (or overflowed) line was consumed.
    pub fn feed_byte<P: PreferenceStore>(
        &mut self,
        byte: u8,
        ctx: &mut DispatchContext<'_, P>,
    ) -> Option<Response> {
        match self.line.push_byte(byte)? {
            LineEvent::TooLong => Some(nak("LIN", "LTL")),
            LineEvent::Line(line) => Some(self.dispatch_line(line.as_str(), ctx)),
        }
    }

    fn dispatch_line<P: PreferenceStore>(
        &mut self,
        line: &str,
        ctx: &mut DispatchContext<'_, P>,
    ) -> Response {
        let tokens = tokenize(line);
        let Some(&cmd) = tokens.first() else {
            return nak("LIN", "LIN");
        };
        if cmd.len() != 3 {
            return nak("LIN", "LIN");
        }
        let args = &tokens[1..];
        match cmd {
            "VER" => self.cmd_ver(args),
            "FRE" => self.cmd_fre(args, ctx),
            "QUE" => self.cmd_que(args, ctx),
            "RST" => self.cmd_rst(args, ctx),
            "DBG" => self.cmd_dbg(args, ctx),
            "CLC" => self.cmd_clc(args, ctx),
            "DIM" => self.cmd_dim(args, ctx),
            "DTH" => self.cmd_dth(args, ctx),
            "ROT" => self.cmd_rot(args, ctx),
            "PWR" => self.cmd_pwr(args, ctx),
            "ANM" => self.cmd_anm(args, ctx),
            "FRM" => self.cmd_frm(args, ctx),
            "RGB" => self.cmd_rgb(args, ctx),
            "DON" => self.cmd_don(args, ctx),
            "NXT" => self.cmd_nxt(args, ctx),
            _ => nak(cmd, "CMD"),
        }
    }

    fn cmd_ver(&self, args: &[&str]) -> Response {
        if !args.is_empty() {
            return nak("VER", "ARG");
        }
        ack_fmt("VER", format_args!("{}", FIRMWARE_VERSION))
    }

    fn cmd_fre<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        if !args.is_empty() {
            return nak("FRE", "ARG");
        }
        let (a, f) = ctx.pool.free_counts();
        ack_fmt("FRE", format_args!("{} {}", a, f))
    }

    fn cmd_que<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        if !args.is_empty() {
            return nak("QUE", "ARG");
        }
        let mut body: Response = Response::new();
        let _ = write!(body, "ACK QUE");
        for (remaining, frames) in ctx.pool.queue_snapshot(ctx.now_ms) {
            let _ = write!(body, " {},{}", remaining, frames);
        }
        body
    }

    fn cmd_rst<P: PreferenceStore>(&mut self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        if !args.is_empty() {
            return nak("RST", "ARG");
        }
        ctx.pool.reset();
        self.frame_armed = false;
        self.matrix_clear_pending = true;
        ack("RST")
    }

    fn cmd_dbg<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        if !args.is_empty() {
            return nak("DBG", "ARG");
        }
        let (fs, fl, as_, al) = ctx.pool.debug_snapshot();
        ack_fmt("DBG", format_args!("{} {} {} {} {}", fs, fl, as_, al, self.frame_armed as u8))
    }

    fn cmd_clc<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        match args {
            [] => {
                let (r, g, b) = ctx.matrix.color_correction();
                ack_fmt("CLC", format_args!("{:02X}{:02X}{:02X}", r, g, b))
            }
            ["RST"] => {
                ctx.matrix.set_color_correction(255, 255, 255);
                ctx.prefs.clear(PrefKey::ColorCorrection);
                ack_fmt("CLC", format_args!("FFFFFF"))
            }
            [hex6] => match parse_hex6(hex6) {
                Some((r, g, b)) => {
                    ctx.matrix.set_color_correction(r, g, b);
                    ctx.prefs.set(PrefKey::ColorCorrection, pack_color_correction(r, g, b));
                    ack_fmt("CLC", format_args!("{:02X}{:02X}{:02X}", r, g, b))
                }
                None => nak("CLC", "ARG"),
            },
            _ => nak("CLC", "ARG"),
        }
    }

    fn cmd_dim<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        match args {
            [] => ack_fmt("DIM", format_args!("{}", ctx.matrix.brightness())),
            [n] => match n.parse::<u16>() {
                Ok(v) if v <= 255 => {
                    ctx.matrix.set_brightness(v as u8);
                    ctx.prefs.set(PrefKey::Dim, v as u32);
                    ack_fmt("DIM", format_args!("{}", v))
                }
                _ => nak("DIM", "ARG"),
            },
            _ => nak("DIM", "ARG"),
        }
    }

    fn cmd_dth<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        match args {
            ["ON"] => {
                ctx.matrix.set_dither(true);
                ctx.prefs.set(PrefKey::Dither, 1);
                ack_fmt("DTH", format_args!("ON"))
            }
            ["OFF"] => {
                ctx.matrix.set_dither(false);
                ctx.prefs.set(PrefKey::Dither, 0);
                ack_fmt("DTH", format_args!("OFF"))
            }
            _ => nak("DTH", "ARG"),
        }
    }

    fn cmd_rot<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        match args {
            [] => ack_fmt("ROT", format_args!("{}", ctx.matrix.rotation().as_token())),
            [token] => match Rotation::from_token(token) {
                Some(r) => {
                    ctx.matrix.set_rotation(r);
                    ctx.prefs.set(PrefKey::Rotation, rotation_pref_value(r));
                    ack_fmt("ROT", format_args!("{}", r.as_token()))
                }
                None => nak("ROT", "ARG"),
            },
            _ => nak("ROT", "ARG"),
        }
    }

    fn cmd_pwr<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        match args {
            [] => ack_fmt("PWR", format_args!("{}", ctx.power.current_budget().as_token())),
            ["RST"] => {
                ctx.power.set_override(None);
                ctx.prefs.clear(PrefKey::PowerOverride);
                ack_fmt("PWR", format_args!("{}", ctx.power.current_budget().as_token()))
            }
            [token] => match CurrentBudget::from_token(token) {
                Some(b) => {
                    ctx.power.set_override(Some(b));
                    ctx.prefs.set(PrefKey::PowerOverride, power_pref_value(b));
                    ack_fmt("PWR", format_args!("{}", b.as_token()))
                }
                None => nak("PWR", "ARG"),
            },
            _ => nak("PWR", "ARG"),
        }
    }

    fn cmd_anm<P: PreferenceStore>(&mut self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        let [ms] = args else { return nak("ANM", "ARG") };
        let Ok(duration) = ms.parse::<u32>() else { return nak("ANM", "ARG") };
        match ctx.pool.start_loading(duration) {
            Ok(()) => {
                self.frame_armed = false;
                ack_fmt("ANM", format_args!("{}", duration))
            }
            Err(e) => nak("ANM", NakCode::from(e).as_str()),
        }
    }

    fn cmd_frm<P: PreferenceStore>(&mut self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        let [ms] = args else { return nak("FRM", "ARG") };
        let Ok(duration) = ms.parse::<u32>() else { return nak("FRM", "ARG") };
        match ctx.pool.get_frame_to_load() {
            Ok(frame) => {
                frame.set_duration(duration);
                self.frame_armed = true;
                ack_fmt("FRM", format_args!("{}", duration))
            }
            Err(e) => nak("FRM", NakCode::from(e).as_str()),
        }
    }

    fn cmd_rgb<P: PreferenceStore>(&mut self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        let [hex] = args else { return nak("RGB", "ARG") };
        if !self.frame_armed {
            return nak("RGB", "NFM");
        }
        if hex.len() != ROW_HEX_LEN {
            return nak("RGB", "ARG");
        }
        let Some(frame) = ctx.pool.current_loading_frame_mut() else {
            crate::cant_happen("dispatch::cmd_rgb armed with no loading frame");
            self.frame_armed = false;
            return nak("RGB", "NFM");
        };
        match frame.load_hex(hex) {
            // Stays armed once the frame completes: a 17th row then falls
            // through to `Frame::load_hex`'s own `Full` check and surfaces
            // `OFL`, per the over-fill boundary behavior. Only `FRM`, `DON`,
            // or a new `ANM` disarms it.
            Ok((row, _complete)) => ack_fmt("RGB", format_args!("{}", row)),
            Err(e) => nak("RGB", NakCode::from(e).as_str()),
        }
    }

    fn cmd_don<P: PreferenceStore>(&mut self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        if !args.is_empty() {
            return nak("DON", "ARG");
        }
        if !ctx.pool.is_loading_animation() {
            return nak("DON", "NOA");
        }
        ctx.pool.finalize_loading();
        self.frame_armed = false;
        ack_fmt("DON", format_args!("ANM"))
    }

    fn cmd_nxt<P: PreferenceStore>(&self, args: &[&str], ctx: &mut DispatchContext<'_, P>) -> Response {
        if !args.is_empty() {
            return nak("NXT", "ARG");
        }
        ctx.pool.skip_current();
        ack("NXT")
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn rotation_pref_value(r: Rotation) -> u32 {
    match r {
        Rotation::Deg0 => 0,
        Rotation::Deg90 => 90,
        Rotation::Deg180 => 180,
        Rotation::Deg270 => 270,
    }
}

fn power_pref_value(b: CurrentBudget) -> u32 {
    match b {
        CurrentBudget::Unknown => 0,
        CurrentBudget::Legacy0_5A => 1,
        CurrentBudget::Current1_5A => 2,
        CurrentBudget::Current3_0A => 3,
    }
}

fn parse_hex6(s: &str) -> Option<(u8, u8, u8)> {
    if s.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some((r, g, b))
}

fn ack(cmd: &str) -> Response {
    let mut resp = Response::new();
    let _ = write!(resp, "ACK {}", cmd);
    resp
}

fn ack_fmt(cmd: &str, args: core::fmt::Arguments<'_>) -> Response {
    let mut resp = Response::new();
    let _ = write!(resp, "ACK {} {}", cmd, args);
    resp
}

fn nak(cmd: &str, code: &str) -> Response {
    let mut resp = Response::new();
    let _ = write!(resp, "NAK {} {}", cmd, code);
    resp
}

/// Reads back a preference written by [`power_pref_value`]/[`rotation_pref_value`],
/// used by the main loop on boot. Kept here since it's the inverse of the
/// encoding this module owns.
pub fn current_budget_from_pref(value: u32) -> Option<CurrentBudget> {
    match value {
        1 => Some(CurrentBudget::Legacy0_5A),
        2 => Some(CurrentBudget::Current1_5A),
        3 => Some(CurrentBudget::Current3_0A),
        _ => None,
    }
}

pub fn rotation_from_pref(value: u32) -> Option<Rotation> {
    match value {
        0 => Some(Rotation::Deg0),
        90 => Some(Rotation::Deg90),
        180 => Some(Rotation::Deg180),
        270 => Some(Rotation::Deg270),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::prefs::MemoryPreferenceStore;

    struct Fixture {
        pool: AnimationPool,
        matrix: MatrixDriver,
        power: PowerController,
        prefs: MemoryPreferenceStore,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                pool: AnimationPool::new(),
                matrix: MatrixDriver::default(),
                power: PowerController::new(),
                prefs: MemoryPreferenceStore::new(),
            }
        }

        fn ctx(&mut self, now_ms: u32) -> DispatchContext<'_, MemoryPreferenceStore> {
            DispatchContext {
                pool: &mut self.pool,
                matrix: &mut self.matrix,
                power: &mut self.power,
                prefs: &mut self.prefs,
                now_ms,
            }
        }
    }

    fn feed_line(d: &mut Dispatcher, ctx: &mut DispatchContext<'_, MemoryPreferenceStore>, line: &str) -> Response {
        let mut last = None;
        for b in line.bytes() {
            last = d.feed_byte(b, ctx);
        }
        last = last.or(d.feed_byte(b'\n', ctx));
        last.unwrap()
    }

    #[test]
    fn version_handshake() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        assert_eq!(feed_line(&mut d, &mut ctx, "VER\n").as_str(), "ACK VER 1.0");
    }

    #[test]
    fn unknown_command_is_nak_cmd() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        assert_eq!(feed_line(&mut d, &mut ctx, "ZZZ\n").as_str(), "NAK ZZZ CMD");
    }

    #[test]
    fn rgb_without_frm_is_nfm() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        let row = "00".repeat(ROW_HEX_LEN / 2);
        assert_eq!(feed_line(&mut d, &mut ctx, &format!("RGB {}\n", row)).as_str(), "NAK RGB NFM");
    }

    #[test]
    fn minimal_animation_end_to_end() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);

        assert_eq!(feed_line(&mut d, &mut ctx, "ANM 2000\n").as_str(), "ACK ANM 2000");
        assert_eq!(feed_line(&mut d, &mut ctx, "FRM 1000\n").as_str(), "ACK FRM 1000");

        let row = "FF0000".repeat(16);
        for y in 0..16 {
            let expected = format!("ACK RGB {}", y);
            assert_eq!(feed_line(&mut d, &mut ctx, &format!("RGB {}\n", row)).as_str(), expected);
        }
        assert_eq!(feed_line(&mut d, &mut ctx, "DON\n").as_str(), "ACK DON ANM");

        let (a, f) = fx.pool.free_counts();
        assert_eq!((a, f), (crate::MAX_ANIMATIONS - 1, crate::MAX_FRAMES - 1));
    }

    #[test]
    fn oversubscription_then_reset() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();

        for _ in 0..crate::MAX_ANIMATIONS {
            let mut ctx = fx.ctx(0);
            assert_eq!(feed_line(&mut d, &mut ctx, "ANM 100\n").as_str(), "ACK ANM 100");
            feed_line(&mut d, &mut ctx, "DON\n");
        }
        {
            let mut ctx = fx.ctx(0);
            assert_eq!(feed_line(&mut d, &mut ctx, "ANM 100\n").as_str(), "NAK ANM UFL");
            assert_eq!(feed_line(&mut d, &mut ctx, "RST\n").as_str(), "ACK RST");
            assert_eq!(
                feed_line(&mut d, &mut ctx, "FRE\n").as_str(),
                format!("ACK FRE {} {}", crate::MAX_ANIMATIONS, crate::MAX_FRAMES)
            );
        }
        assert!(d.matrix_clear_pending);
    }

    #[test]
    fn rgb_wrong_length_is_arg() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        feed_line(&mut d, &mut ctx, "ANM 1000\n");
        feed_line(&mut d, &mut ctx, "FRM 1000\n");
        assert_eq!(feed_line(&mut d, &mut ctx, "RGB FF00\n").as_str(), "NAK RGB ARG");
    }

    #[test]
    fn skip_with_two_live_animations() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        feed_line(&mut d, &mut ctx, "ANM 60000\n");
        feed_line(&mut d, &mut ctx, "DON\n");
        feed_line(&mut d, &mut ctx, "ANM 60000\n");
        feed_line(&mut d, &mut ctx, "DON\n");
        assert_eq!(feed_line(&mut d, &mut ctx, "NXT\n").as_str(), "ACK NXT");
        let (_, _, _, anims_len) = fx.pool.debug_snapshot();
        assert_eq!(anims_len, 1);
    }

    #[test]
    fn rotation_round_trips_through_command_and_preference() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        assert_eq!(feed_line(&mut d, &mut ctx, "ROT 090\n").as_str(), "ACK ROT 090");
        assert_eq!(fx.prefs.get(PrefKey::Rotation), Some(90));
        assert_eq!(feed_line(&mut d, &mut ctx, "ROT\n").as_str(), "ACK ROT 090");
    }

    #[test]
    fn color_correction_round_trips() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        assert_eq!(feed_line(&mut d, &mut ctx, "CLC 112233\n").as_str(), "ACK CLC 112233");
        assert_eq!(feed_line(&mut d, &mut ctx, "CLC\n").as_str(), "ACK CLC 112233");
        assert_eq!(feed_line(&mut d, &mut ctx, "CLC RST\n").as_str(), "ACK CLC FFFFFF");
    }

    #[test]
    fn que_reports_remaining_and_frame_counts() {
        let mut fx = Fixture::new();
        let mut d = Dispatcher::new();
        let mut ctx = fx.ctx(0);
        feed_line(&mut d, &mut ctx, "ANM 5000\n");
        feed_line(&mut d, &mut ctx, "FRM 1000\n");
        let row = "00".repeat(ROW_HEX_LEN / 2);
        feed_line(&mut d, &mut ctx, &format!("RGB {}\n", row));
        // Frame isn't complete (one row of sixteen), so DON would NAK; query mid-load instead.
        let resp = feed_line(&mut d, &mut ctx, "QUE\n");
        assert_eq!(resp.as_str(), "ACK QUE 5000,1");
    }
}
