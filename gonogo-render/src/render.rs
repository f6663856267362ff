use std::collections::HashMap;
use std::sync::Arc;

use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow, ensure};
use bytemuck::{cast_slice, cast_slice_mut};
use gonogo_cache::{Atom, get_text, intern_text};
use gonogo_core::{Feedback, GoNoGoPhase, Phase, TrialState, Word};
use tiny_skia::{Color, Paint, Pixmap, PremultipliedColorU8, Rect, Transform};

const WHITE: [u8; 4] = [255, 255, 255, 255];
const GREEN: [u8; 4] = [0, 128, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

const STIMULUS_SIZE: f32 = 48.0;
const FEEDBACK_SIZE: f32 = 32.0;
const LABEL_SIZE: f32 = 24.0;
const SCREEN_SIZE: f32 = 28.0;
const SCREEN_LINE_GAP: f32 = 16.0;

const WELCOME_LINES: &[&str] = &[
    "Welcome to the experiment.",
    "Press any key to begin.",
];

const INSTRUCTION_LINES: &[&str] = &[
    "In this experiment, you will see different colored words.",
    "If you see the word 'ROOD' or 'GEEL', press the SPACEBAR as quickly as you can.",
    "If you see the word 'BLAUW', do NOT press any key - just wait for the next word.",
    "First, you will do 5 practice trials.",
    "Press any key to start the practice.",
];

const PRACTICE_END_LINES: &[&str] = &[
    "You have completed the practice trials.",
    "The main experiment will now begin.",
    "Remember:",
    "Press SPACEBAR for ROOD and GEEL",
    "Do NOT press any key for BLAUW",
    "Press any key to begin the main experiment.",
];

const DEBRIEF_LINES: &[&str] = &[
    "Thank you for participating! The experiment is now complete.",
];

const FONT_ENV: &str = "GONOGO_FONT";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[repr(usize)]
#[derive(Debug, Clone, Copy)]
enum CacheIndex {
    FixationCross = 0,

    // Stimulus words (1-3)
    WordRood = 1,
    WordGeel = 2,
    WordBlauw = 3,

    // Practice feedback messages (4-7)
    FeedbackHit = 4,
    FeedbackMiss = 5,
    FeedbackCorrectRejection = 6,
    FeedbackFalseAlarm = 7,

    PracticeBanner = 8,
    Calibrating = 9,
}

impl CacheIndex {
    const STATIC_COUNT: usize = 10;
}

fn word_slot(word: Word) -> usize {
    match word {
        Word::Rood => CacheIndex::WordRood as usize,
        Word::Geel => CacheIndex::WordGeel as usize,
        Word::Blauw => CacheIndex::WordBlauw as usize,
    }
}

fn feedback_slot(feedback: Feedback) -> usize {
    match feedback {
        Feedback::Hit => CacheIndex::FeedbackHit as usize,
        Feedback::Miss => CacheIndex::FeedbackMiss as usize,
        Feedback::CorrectRejection => CacheIndex::FeedbackCorrectRejection as usize,
        Feedback::FalseAlarm => CacheIndex::FeedbackFalseAlarm as usize,
    }
}

/// Snapshot of what the experiment wants on screen this frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView {
    pub phase: GoNoGoPhase,
    pub word: Option<Word>,
    pub trial_state: Option<TrialState>,
    pub feedback: Option<Feedback>,
    pub progress: Option<(usize, usize)>,
}

/// Pre-rendered multi-line message screens, one pixmap per line.
struct Screens {
    welcome: Vec<Pixmap>,
    instructions: Vec<Pixmap>,
    practice_end: Vec<Pixmap>,
    debrief: Vec<Pixmap>,
}

struct TextCache {
    font: FontArc,
    size_px: f32,
    map: HashMap<Atom, Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: FontArc, size_px: f32) -> Self {
        Self {
            font,
            size_px,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, atom: Atom) -> Arc<Pixmap> {
        if let Some(pm) = self.map.get(&atom) {
            return Arc::clone(pm);
        }
        let pm = Arc::new(render_text_pixmap(
            atom.as_ref(),
            self.size_px,
            &self.font,
            WHITE,
        ));
        self.map.insert(atom, Arc::clone(&pm));
        pm
    }
}

/// CPU renderer. Every string and stimulus is rasterized once into a
/// premultiplied pixmap; per frame the canvas is cleared and the cached
/// pixmaps are blitted.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    static_cache: Vec<Pixmap>,
    screens: Screens,
    text_cache: TextCache,
    progress_interns: HashMap<(usize, usize), usize>,

    canvas: Pixmap,
}

impl SkiaRenderer {
    pub fn new(
        width: u32,
        height: u32,
        practice_trials: usize,
        main_trials: usize,
    ) -> Result<Self> {
        let font = load_font()?;

        let mut canvas =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("empty canvas {width}x{height}"))?;
        canvas.fill(Color::from_rgba8(0, 0, 0, 255));

        let mut static_cache =
            vec![Pixmap::new(1, 1).expect("pixmap"); CacheIndex::STATIC_COUNT];
        static_cache[CacheIndex::FixationCross as usize] = fixation_cross_pixmap();
        for word in [Word::Rood, Word::Geel, Word::Blauw] {
            static_cache[word_slot(word)] =
                render_text_pixmap(word.text(), STIMULUS_SIZE, &font, word.color());
        }
        for feedback in [
            Feedback::Hit,
            Feedback::Miss,
            Feedback::CorrectRejection,
            Feedback::FalseAlarm,
        ] {
            let color = if feedback.is_correct() { GREEN } else { RED };
            static_cache[feedback_slot(feedback)] =
                render_text_pixmap(feedback.message(), FEEDBACK_SIZE, &font, color);
        }
        static_cache[CacheIndex::PracticeBanner as usize] =
            render_text_pixmap("PRACTICE MODE", LABEL_SIZE, &font, WHITE);
        static_cache[CacheIndex::Calibrating as usize] =
            render_text_pixmap("CALIBRATING...", FEEDBACK_SIZE, &font, WHITE);

        let screens = Screens {
            welcome: render_lines(WELCOME_LINES, &font),
            instructions: render_lines(INSTRUCTION_LINES, &font),
            practice_end: render_lines(PRACTICE_END_LINES, &font),
            debrief: render_lines(DEBRIEF_LINES, &font),
        };

        Ok(SkiaRenderer {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            static_cache,
            screens,
            text_cache: TextCache::new(font, LABEL_SIZE),
            progress_interns: pre_intern_progress(practice_trials, main_trials),
            canvas,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        self.canvas = Pixmap::new(new_width, new_height)
            .ok_or_else(|| anyhow!("empty canvas {new_width}x{new_height}"))?;
        self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
        Ok(())
    }

    pub fn render_frame(&mut self, view: &FrameView, frame_buffer: &mut [u8]) -> Result<()> {
        self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
        self.render_phase(view);

        ensure!(
            frame_buffer.len() == self.canvas.data().len(),
            "frame buffer is {} bytes, canvas is {}",
            frame_buffer.len(),
            self.canvas.data().len()
        );
        frame_buffer.copy_from_slice(self.canvas.data());
        Ok(())
    }

    fn render_phase(&mut self, view: &FrameView) {
        match view.phase {
            GoNoGoPhase::Welcome => {
                blit_lines(&mut self.canvas, &self.screens.welcome, self.center);
            }
            GoNoGoPhase::Calibration => {
                blit(
                    &mut self.canvas,
                    &self.static_cache[CacheIndex::Calibrating as usize],
                    self.center,
                );
            }
            GoNoGoPhase::Instructions => {
                blit_lines(&mut self.canvas, &self.screens.instructions, self.center);
            }
            GoNoGoPhase::Practice | GoNoGoPhase::Experiment => {
                self.render_trial(view);
            }
            GoNoGoPhase::PracticeEnd => {
                blit_lines(&mut self.canvas, &self.screens.practice_end, self.center);
            }
            GoNoGoPhase::Debrief => {
                blit_lines(&mut self.canvas, &self.screens.debrief, self.center);
            }
        }
    }

    fn render_trial(&mut self, view: &FrameView) {
        match view.trial_state {
            Some(TrialState::Fixation) => {
                blit(
                    &mut self.canvas,
                    &self.static_cache[CacheIndex::FixationCross as usize],
                    self.center,
                );
            }
            Some(TrialState::Response) => {
                if let Some(word) = view.word {
                    blit(&mut self.canvas, &self.static_cache[word_slot(word)], self.center);
                }
            }
            Some(TrialState::Feedback) => {
                if let Some(feedback) = view.feedback {
                    blit(
                        &mut self.canvas,
                        &self.static_cache[feedback_slot(feedback)],
                        self.center,
                    );
                }
            }
            // Blank between trials.
            Some(TrialState::Complete) | None => {}
        }

        if let Some((current, total)) = view.progress {
            if let Some(&intern_id) = self.progress_interns.get(&(current, total)) {
                if let Some(atom) = get_text(intern_id) {
                    let pm = self.text_cache.get_or_render(atom);
                    blit(&mut self.canvas, &pm, (90.0, 30.0));
                }
            }
        }

        if view.phase.is_practice() {
            blit(
                &mut self.canvas,
                &self.static_cache[CacheIndex::PracticeBanner as usize],
                (self.center.0, 30.0),
            );
        }
    }
}

fn load_font() -> Result<FontArc> {
    if let Ok(path) = std::env::var(FONT_ENV) {
        let data =
            std::fs::read(&path).with_context(|| format!("reading font {path}"))?;
        return FontArc::try_from_vec(data).with_context(|| format!("parsing font {path}"));
    }
    for candidate in FONT_CANDIDATES {
        if let Ok(data) = std::fs::read(candidate) {
            if let Ok(font) = FontArc::try_from_vec(data) {
                return Ok(font);
            }
        }
    }
    Err(anyhow!(
        "no usable font found; set {FONT_ENV} to a TrueType font path"
    ))
}

fn pre_intern_progress(
    practice_trials: usize,
    main_trials: usize,
) -> HashMap<(usize, usize), usize> {
    let mut interns = HashMap::new();
    for total in [practice_trials, main_trials] {
        for current in 0..=total {
            interns.insert(
                (current, total),
                intern_text(&format!("Trial: {current}/{total}")),
            );
        }
    }
    interns
}

fn render_lines(lines: &[&str], font: &FontArc) -> Vec<Pixmap> {
    lines
        .iter()
        .map(|line| render_text_pixmap(line, SCREEN_SIZE, font, WHITE))
        .collect()
}

/// Rasterizes one line of text into a tight premultiplied pixmap.
fn render_text_pixmap(text: &str, font_size: f32, font: &FontArc, color: [u8; 4]) -> Pixmap {
    let scale = PxScale::from(font_size);
    let scaled = font.as_scaled(scale);

    // Lay the glyphs out along a baseline at the font's ascent.
    let mut glyphs: Vec<Glyph> = Vec::new();
    let mut pen_x = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = previous {
            pen_x += scaled.kern(prev, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, scaled.ascent()),
        });
        pen_x += scaled.h_advance(id);
        previous = Some(id);
    }

    let outlines: Vec<_> = glyphs
        .iter()
        .filter_map(|glyph| font.outline_glyph(glyph.clone()))
        .collect();

    let mut bounds: Option<(f32, f32, f32, f32)> = None;
    for outline in &outlines {
        let b = outline.px_bounds();
        bounds = Some(match bounds {
            None => (b.min.x, b.min.y, b.max.x, b.max.y),
            Some((x0, y0, x1, y1)) => (
                x0.min(b.min.x),
                y0.min(b.min.y),
                x1.max(b.max.x),
                y1.max(b.max.y),
            ),
        });
    }
    let Some((min_x, min_y, max_x, max_y)) = bounds else {
        return Pixmap::new(1, 1).expect("pixmap");
    };

    let width = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let height = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height).expect("pixmap");

    let stride = width as usize;
    let [red, green, blue, alpha] = color;
    let pixels = pixmap.pixels_mut();

    for outline in &outlines {
        let b = outline.px_bounds();
        outline.draw(|x, y, coverage| {
            if coverage <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= width as i32 || iy >= height as i32 {
                return;
            }

            // Premultiply by coverage; where glyphs overlap keep the
            // stronger coverage.
            let a_lin = (coverage * alpha as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a_lin * 255.0) as u8;
            let idx = iy as usize * stride + ix as usize;
            let existing = pixels[idx];
            if sa > existing.alpha() {
                let sr = (red as f32 * a_lin) as u8;
                let sg = (green as f32 * a_lin) as u8;
                let sb = (blue as f32 * a_lin) as u8;
                pixels[idx] =
                    PremultipliedColorU8::from_rgba(sr, sg, sb, sa).unwrap_or(existing);
            }
        });
    }

    pixmap
}

fn fixation_cross_pixmap() -> Pixmap {
    let size = 40u32;
    let mut pm = Pixmap::new(size, size).expect("pixmap");

    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::from_rgba8(255, 255, 255, 255));

    let thickness = 2.0;
    let mid = (size as f32 - thickness) * 0.5;
    let bars = [
        Rect::from_xywh(0.0, mid, size as f32, thickness),
        Rect::from_xywh(mid, 0.0, thickness, size as f32),
    ];
    for bar in bars.into_iter().flatten() {
        pm.fill_rect(bar, &paint, Transform::identity(), None);
    }
    pm
}

/// Blits a premultiplied pixmap onto the canvas centered at `center`,
/// clipping at the edges. Fully opaque pixels are copied, the rest are
/// blended with Porter-Duff over.
fn blit(canvas: &mut Pixmap, src: &Pixmap, center: (f32, f32)) {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let (sw, sh) = (src.width() as i32, src.height() as i32);

    let x0 = (center.0 - sw as f32 * 0.5).floor() as i32;
    let y0 = (center.1 - sh as f32 * 0.5).floor() as i32;

    let dst_x = x0.max(0);
    let dst_y = y0.max(0);
    let src_x = (dst_x - x0) as usize;
    let src_y = (dst_y - y0) as usize;
    let copy_w = (x0 + sw).min(cw) - dst_x;
    let copy_h = (y0 + sh).min(ch) - dst_y;
    if copy_w <= 0 || copy_h <= 0 {
        return;
    }

    let (dst_x, dst_y) = (dst_x as usize, dst_y as usize);
    let (copy_w, copy_h) = (copy_w as usize, copy_h as usize);
    let canvas_stride = cw as usize;
    let src_stride = sw as usize;

    let src_px: &[u32] = cast_slice(src.data());
    let dst_px: &mut [u32] = cast_slice_mut(canvas.data_mut());

    for row in 0..copy_h {
        let s = (src_y + row) * src_stride + src_x;
        let d = (dst_y + row) * canvas_stride + dst_x;
        for i in 0..copy_w {
            let sp = src_px[s + i];
            let sa = sp >> 24;
            if sa == 255 {
                dst_px[d + i] = sp;
            } else if sa > 0 {
                let dp = dst_px[d + i];
                let inv = 255 - sa;
                let over = |sc: u32, dc: u32| sc + (dc * inv + 127) / 255;
                let r = over(sp & 0xFF, dp & 0xFF);
                let g = over((sp >> 8) & 0xFF, (dp >> 8) & 0xFF);
                let b = over((sp >> 16) & 0xFF, (dp >> 16) & 0xFF);
                let a = over(sa, dp >> 24);
                dst_px[d + i] = (a << 24) | (b << 16) | (g << 8) | r;
            }
        }
    }
}

/// Blits a stack of line pixmaps vertically centered around `center`.
fn blit_lines(canvas: &mut Pixmap, lines: &[Pixmap], center: (f32, f32)) {
    let total_height: f32 = lines.iter().map(|pm| pm.height() as f32).sum::<f32>()
        + SCREEN_LINE_GAP * lines.len().saturating_sub(1) as f32;

    let mut y = center.1 - total_height / 2.0;
    for line in lines {
        let half = line.height() as f32 / 2.0;
        blit(canvas, line, (center.0, y + half));
        y += line.height() as f32 + SCREEN_LINE_GAP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_pixmap(width: u32, height: u32, color: [u8; 4]) -> Pixmap {
        let mut pm = Pixmap::new(width, height).unwrap();
        pm.fill(Color::from_rgba8(color[0], color[1], color[2], color[3]));
        pm
    }

    #[test]
    fn blit_centers_the_source_on_the_canvas() {
        let mut canvas = solid_pixmap(4, 4, [0, 0, 0, 255]);
        let src = solid_pixmap(2, 2, [255, 0, 0, 255]);

        blit(&mut canvas, &src, (2.0, 2.0));

        let px = canvas.pixels();
        // Corners untouched, center painted.
        assert_eq!(px[0].red(), 0);
        assert_eq!(px[1 * 4 + 1].red(), 255);
        assert_eq!(px[2 * 4 + 2].red(), 255);
        assert_eq!(px[3 * 4 + 3].red(), 0);
    }

    #[test]
    fn blit_clips_at_the_canvas_edge() {
        let mut canvas = solid_pixmap(4, 4, [0, 0, 0, 255]);
        let src = solid_pixmap(4, 4, [0, 255, 0, 255]);

        // Mostly off the top-left corner; must not panic and must paint
        // the overlapping quadrant only.
        blit(&mut canvas, &src, (0.0, 0.0));

        let px = canvas.pixels();
        assert_eq!(px[0].green(), 255);
        assert_eq!(px[1 * 4 + 1].green(), 255);
        assert_eq!(px[2 * 4 + 2].green(), 0);
    }

    #[test]
    fn fixation_cross_has_centered_bars() {
        let pm = fixation_cross_pixmap();
        let px = pm.pixels();
        let stride = pm.width() as usize;
        // On the vertical bar.
        assert_eq!(px[stride / 2].alpha(), 255);
        // Off both bars.
        assert_eq!(px[stride + 1].alpha(), 0);
    }

    #[test]
    fn progress_interns_cover_both_blocks() {
        let interns = pre_intern_progress(5, 50);
        assert!(interns.contains_key(&(0, 5)));
        assert!(interns.contains_key(&(5, 5)));
        assert!(interns.contains_key(&(50, 50)));
        assert!(!interns.contains_key(&(51, 50)));

        let id = interns[&(1, 50)];
        assert_eq!(get_text(id).as_deref(), Some("Trial: 1/50"));
    }
}
