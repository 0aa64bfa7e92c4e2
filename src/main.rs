//! Petal Post entry point
//!
//! Handles platform-specific initialization and drives the scene flow.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{
        AddEventListenerOptions, CssStyleDeclaration, Document, Element, Event, EventTarget,
        HtmlElement, Node,
    };

    use petal_post::audio::MusicPlayer;
    use petal_post::platform::{self, PlatformError, SERVICE_WORKER_SCRIPT};
    use petal_post::renderer::{CanvasSurface, draw_layer};
    use petal_post::sim::{
        AcceptSize, Effect, Entity, FlowController, SceneContent, Sticker, Tap, TapSource, Target,
    };
    use petal_post::{Settings, Viewport};

    /// One attached DOM listener
    struct Binding {
        target: EventTarget,
        event: &'static str,
        closure: Closure<dyn FnMut(Event)>,
    }

    /// App instance holding all state
    struct App {
        flow: FlowController,
        document: Document,
        music: MusicPlayer,
        petals: Option<CanvasSurface>,
        confetti: Option<CanvasSurface>,
        bindings: HashMap<Target, Vec<Binding>>,
        /// Pending animation frame request
        frame: Option<i32>,
    }

    impl App {
        fn resize_canvases(&self, viewport: Viewport) {
            for surface in [&self.petals, &self.confetti].into_iter().flatten() {
                surface.resize(viewport.size());
            }
        }

        /// Draw both petal layers
        fn render(&mut self) {
            if let Some(surface) = self.petals.as_mut() {
                if let Err(e) = draw_layer(surface, self.flow.burst()) {
                    log::warn!("Petal draw failed: {}", e);
                }
            }
            if let Some(surface) = self.confetti.as_mut() {
                if let Err(e) = draw_layer(surface, self.flow.ambient()) {
                    log::warn!("Ambient petal draw failed: {}", e);
                }
            }
        }

        /// Measure the evade button so relocation keeps it on screen
        fn measure_evade_button(&mut self) {
            if let Some(el) = self.document.get_element_by_id("btnNo") {
                let rect = el.get_bounding_client_rect();
                if rect.width() > 0.0 && rect.height() > 0.0 {
                    self.flow
                        .set_evade_footprint(Vec2::new(rect.width() as f32, rect.height() as f32));
                }
            }
        }
    }

    // ========================================================================
    // DOM lookups
    // ========================================================================

    fn nth(document: &Document, selector: &str, index: usize) -> Option<Element> {
        document
            .query_selector_all(selector)
            .ok()?
            .item(index as u32)?
            .dyn_into::<Element>()
            .ok()
    }

    fn count(document: &Document, selector: &str) -> usize {
        document
            .query_selector_all(selector)
            .map(|list| list.length() as usize)
            .unwrap_or(0)
    }

    fn element(document: &Document, entity: Entity) -> Option<Element> {
        let by_id = |id: &str| document.get_element_by_id(id);
        match entity {
            Entity::Screen(scene) => by_id(scene.dom_id()),
            Entity::HeartWrapper => by_id("heartTapWrapper"),
            Entity::HeartContainer => nth(document, "#screenBoot .heart-tap-container", 0),
            Entity::HeartPulseRing => by_id("heartPulseRing"),
            Entity::TapCount => by_id("tapCount"),
            Entity::TapTotal => by_id("tapTotal"),
            Entity::Envelope => by_id("envelope"),
            Entity::EnvelopeHint => by_id("envelopeHint"),
            Entity::LetterPaper => by_id("letterPaper"),
            Entity::LetterHint => by_id("letterHint"),
            Entity::LetterParagraph(i) => nth(document, "#letterPaper .letter-paragraph", i),
            Entity::PhotoStrip => by_id("floatingPhotos"),
            Entity::Photo(i) => nth(document, "#floatingPhotos .photo-frame", i),
            Entity::MessageLine(i) => nth(document, "#screenMessage .message-line", i),
            Entity::MessageHint => by_id("messageHint"),
            Entity::InvitationTitle => nth(document, "#screenInvitation .invitation-title", 0),
            Entity::AcceptButton => by_id("btnYes"),
            Entity::EvadeButton => by_id("btnNo"),
            Entity::YesSticker => by_id("yesSticker"),
            Entity::DecorElement(i) => nth(document, "#screenConfirmation .decor-element", i),
            Entity::CornerDecor(i) => nth(document, "#screenConfirmation .confirmation-decor", i),
            Entity::MusicToggle => by_id("musicToggle"),
            Entity::PetalCanvas => by_id("petalCanvas"),
            Entity::ConfettiCanvas => by_id("confettiCanvas"),
        }
    }

    fn listener_target(document: &Document, target: Target) -> Option<EventTarget> {
        match target.selector() {
            Some(selector) => nth(document, selector, 0).map(EventTarget::from),
            None => Some(document.clone().into()),
        }
    }

    fn with_style(
        document: &Document,
        entity: Entity,
        f: impl FnOnce(&CssStyleDeclaration) -> Result<(), JsValue>,
    ) {
        let Some(el) = element(document, entity).and_then(|el| el.dyn_into::<HtmlElement>().ok())
        else {
            log::debug!("No element for {:?}", entity);
            return;
        };
        if let Err(e) = f(&el.style()) {
            log::warn!("Style update on {:?} failed: {}", entity, PlatformError::from_js(e));
        }
    }

    /// Run `f` after `ms` milliseconds
    fn after(ms: i32, f: impl FnOnce() + 'static) {
        let Some(window) = web_sys::window() else { return };
        let callback = Closure::once_into_js(f);
        if let Err(e) = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), ms)
        {
            log::warn!("setTimeout failed: {}", PlatformError::from_js(e));
        }
    }

    // ========================================================================
    // Effect application
    // ========================================================================

    /// Apply everything the flow queued, then keep the frame loop alive
    fn pump(app: &Rc<RefCell<App>>) {
        let effects = app.borrow_mut().flow.drain_effects();
        for effect in effects {
            apply(app, effect);
        }
        request_frame(app);
    }

    fn apply(app: &Rc<RefCell<App>>, effect: Effect) {
        let document = app.borrow().document.clone();
        match effect {
            Effect::Flag { entity, flag, on } => {
                if let Some(el) = element(&document, entity) {
                    let name = flag.class_name();
                    let classes = el.class_list();
                    let _ = if on {
                        classes.add_1(&name)
                    } else {
                        classes.remove_1(&name)
                    };
                }
            }
            Effect::Restart { entity, flag } => {
                if let Some(el) = element(&document, entity) {
                    let name = flag.class_name();
                    let _ = el.class_list().remove_1(&name);
                    // Reflow so the CSS animation runs again
                    if let Some(html) = el.dyn_ref::<HtmlElement>() {
                        let _ = html.offset_width();
                    }
                    let _ = el.class_list().add_1(&name);
                }
            }
            Effect::Text { entity, text } => {
                if let Some(el) = element(&document, entity) {
                    el.set_text_content(Some(&text));
                }
            }
            Effect::HeartFill(progress) => {
                // The fill rect's y runs from 90 (empty) to 0 (full)
                if let Some(rect) = document.get_element_by_id("heartFillRect") {
                    let _ = rect.set_attribute("y", &(90.0 - progress * 90.0).to_string());
                }
                if let Some(bar) = document
                    .get_element_by_id("heartProgressBar")
                    .and_then(|el| el.dyn_into::<HtmlElement>().ok())
                {
                    let _ = bar
                        .style()
                        .set_property("width", &format!("{}%", progress * 100.0));
                }
            }
            Effect::Place { entity, pos } => with_style(&document, entity, |style| {
                style.set_property("left", &format!("{}px", pos.x))?;
                style.set_property("top", &format!("{}px", pos.y))
            }),
            Effect::Scale { entity, scale } => with_style(&document, entity, |style| {
                style.set_property("transform", &format!("scale({})", scale))
            }),
            Effect::Opacity { entity, value } => with_style(&document, entity, |style| {
                match value {
                    Some(v) => style.set_property("opacity", &v.to_string()),
                    None => style.remove_property("opacity").map(|_| ()),
                }
            }),
            Effect::Interactive { entity, on } => with_style(&document, entity, |style| {
                if on {
                    style.remove_property("pointer-events").map(|_| ())
                } else {
                    style.set_property("pointer-events", "none")
                }
            }),
            Effect::Display { entity, shown } => with_style(&document, entity, |style| {
                if shown {
                    style.remove_property("display").map(|_| ())
                } else {
                    style.set_property("display", "none")
                }
            }),
            Effect::AcceptSize(size) => apply_accept_size(&document, size),
            Effect::AnimationDelay { entity, seconds } => {
                with_style(&document, entity, |style| {
                    style.set_property("animation-delay", &format!("{}s", seconds))
                })
            }
            Effect::Listen { target, on } => {
                if on {
                    attach(app, target);
                } else {
                    detach(app, target);
                }
            }
            Effect::Vibrate(pattern) => {
                if let Err(e) = platform::vibrate(&pattern) {
                    log::debug!("No haptics: {}", e);
                }
            }
            Effect::StartMusic => start_music(app),
            Effect::Volume(volume) => app.borrow().music.set_volume(volume),
            Effect::Sparkle(pos) => spawn_sparkle(&document, pos),
            Effect::Sticker(sticker) => {
                if let Err(e) = spawn_sticker(&document, &sticker) {
                    log::warn!("Sticker failed: {}", PlatformError::from_js(e));
                }
            }
            Effect::ClearStickers => {
                if let Some(container) = document.get_element_by_id("stickersContainer") {
                    container.set_inner_html("");
                }
            }
        }
    }

    fn apply_accept_size(document: &Document, size: AcceptSize) {
        with_style(document, Entity::AcceptButton, |style| match size {
            AcceptSize::Natural => {
                for prop in ["padding", "width", "height", "font-size"] {
                    style.remove_property(prop)?;
                }
                Ok(())
            }
            AcceptSize::Padded {
                padding_rem,
                font_rem,
            } => {
                style.set_property(
                    "padding",
                    &format!("{}rem {}rem", padding_rem, padding_rem * 1.8),
                )?;
                style.set_property("font-size", &format!("{}rem", font_rem))
            }
            AcceptSize::Boxed {
                width_px,
                height_px,
                font_rem,
            } => {
                style.set_property("padding", "0")?;
                style.set_property("width", &format!("{}px", width_px))?;
                style.set_property("height", &format!("{}px", height_px))?;
                style.set_property("font-size", &format!("{}rem", font_rem))
            }
        });
    }

    fn spawn_sparkle(document: &Document, pos: Vec2) {
        let Some(group) = document.get_element_by_id("heartSparkles") else {
            return;
        };
        let Ok(sparkle) = document.create_element_ns(Some("http://www.w3.org/2000/svg"), "circle")
        else {
            return;
        };
        let _ = sparkle.set_attribute("cx", &pos.x.to_string());
        let _ = sparkle.set_attribute("cy", &pos.y.to_string());
        let _ = sparkle.set_attribute("r", "2");
        let _ = sparkle.set_attribute("fill", "#fff");
        let _ = sparkle.set_attribute("style", "opacity: 1; transition: all 0.5s ease-out");
        if group.append_child(&sparkle).is_err() {
            return;
        }

        let rising = sparkle.clone();
        after(10, move || {
            let _ = rising.set_attribute("cy", &(pos.y - 15.0).to_string());
            let _ = rising.set_attribute("style", "opacity: 0; transition: all 0.5s ease-out");
        });
        after(500, move || sparkle.remove());
    }

    fn spawn_sticker(document: &Document, sticker: &Sticker) -> Result<(), JsValue> {
        let Some(container) = document.get_element_by_id("stickersContainer") else {
            return Ok(());
        };
        let wrapper: HtmlElement = document.create_element("div")?.dyn_into()?;
        wrapper.set_class_name("sticker");
        let img = document.create_element("img")?;
        img.set_attribute("src", sticker.image)?;
        img.set_attribute("alt", "Sticker")?;
        wrapper.append_child(&img)?;

        let style = wrapper.style();
        style.set_property("left", &format!("{}px", sticker.pos.x))?;
        style.set_property("top", &format!("{}px", sticker.pos.y))?;
        style.set_property("--sticker-rotation", &format!("{}deg", sticker.rotation_deg))?;
        container.append_child(&wrapper)?;
        Ok(())
    }

    fn start_music(app: &Rc<RefCell<App>>) {
        let (player, volume) = {
            let a = app.borrow();
            (a.music.clone(), a.flow.music().effective_volume())
        };
        let app = app.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let started = match player.play(volume).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Music playback failed: {}", e);
                    false
                }
            };
            app.borrow_mut().flow.music_result(started);
            pump(&app);
        });
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    fn events_for(target: Target) -> &'static [(&'static str, TapSource)] {
        match target {
            // touchstart so the button moves before the finger lifts
            Target::EvadeButton => &[("click", TapSource::Pointer), ("touchstart", TapSource::Touch)],
            _ => &[("click", TapSource::Pointer), ("touchend", TapSource::Touch)],
        }
    }

    fn attach(app: &Rc<RefCell<App>>, target: Target) {
        if app.borrow().bindings.contains_key(&target) {
            return;
        }
        let document = app.borrow().document.clone();
        let Some(event_target) = listener_target(&document, target) else {
            log::warn!(
                "Cannot listen on {:?}: {}",
                target,
                PlatformError::MissingElement(target.selector().unwrap_or("document"))
            );
            return;
        };

        let mut bound = Vec::new();
        for &(event, source) in events_for(target) {
            let app_ref = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |e: Event| {
                on_tap(&app_ref, target, source, &e);
            });
            let callback = closure.as_ref().unchecked_ref();
            let result = if event == "touchstart" {
                let options = AddEventListenerOptions::new();
                options.set_passive(false);
                event_target.add_event_listener_with_callback_and_add_event_listener_options(
                    event, callback, &options,
                )
            } else {
                event_target.add_event_listener_with_callback(event, callback)
            };
            match result {
                Ok(()) => bound.push(Binding {
                    target: event_target.clone(),
                    event,
                    closure,
                }),
                Err(e) => log::warn!("addEventListener({}) failed: {}", event, PlatformError::from_js(e)),
            }
        }
        app.borrow_mut().bindings.insert(target, bound);
    }

    fn detach(app: &Rc<RefCell<App>>, target: Target) {
        let Some(bound) = app.borrow_mut().bindings.remove(&target) else {
            return;
        };
        for binding in bound {
            let _ = binding.target.remove_event_listener_with_callback(
                binding.event,
                binding.closure.as_ref().unchecked_ref(),
            );
        }
    }

    fn on_tap(app: &Rc<RefCell<App>>, target: Target, source: TapSource, event: &Event) {
        match target {
            Target::Document => {
                // These have their own listeners
                let document = app.borrow().document.clone();
                let node = event.target().and_then(|t| t.dyn_into::<Node>().ok());
                let owned_elsewhere = ["envelope", "musicToggle"].iter().any(|id| {
                    document
                        .get_element_by_id(id)
                        .zip(node.as_ref())
                        .is_some_and(|(el, node)| el.contains(Some(node)))
                });
                if owned_elsewhere {
                    return;
                }
            }
            Target::LetterPaper | Target::EvadeButton | Target::MusicToggle => {
                event.prevent_default();
                event.stop_propagation();
            }
            _ => event.prevent_default(),
        }

        {
            let mut a = app.borrow_mut();
            if target == Target::EvadeButton {
                a.measure_evade_button();
            }
            a.flow.tap(Tap::new(target, source, event.time_stamp()));
        }
        pump(app);
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    /// Request a frame if the flow needs one and none is pending
    fn request_frame(app: &Rc<RefCell<App>>) {
        let mut a = app.borrow_mut();
        if a.frame.is_some() || !a.flow.needs_frame() {
            return;
        }
        let Some(window) = web_sys::window() else { return };
        let app_ref = app.clone();
        let callback = Closure::once_into_js(move |time: f64| frame(app_ref, time));
        match window.request_animation_frame(callback.unchecked_ref()) {
            Ok(id) => a.frame = Some(id),
            Err(e) => log::warn!("requestAnimationFrame failed: {}", PlatformError::from_js(e)),
        }
    }

    fn frame(app: Rc<RefCell<App>>, time: f64) {
        {
            let mut a = app.borrow_mut();
            a.frame = None;
            a.flow.update(time);
            a.render();
        }
        pump(&app);
    }

    fn setup_resize(app: &Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else { return };
        let app_ref = app.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
            let viewport = platform::viewport();
            {
                let mut a = app_ref.borrow_mut();
                a.flow.resize(viewport);
                a.resize_canvases(viewport);
                a.render();
            }
            request_frame(&app_ref);
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn canvas(document: &Document, id: &'static str) -> Option<CanvasSurface> {
        match CanvasSurface::from_id(document, id) {
            Ok(surface) => Some(surface),
            Err(e) => {
                log::warn!("Petal layer disabled: {}", e);
                None
            }
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialized".into());
        }

        log::info!("Petal Post starting...");

        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            web_sys::console::error_1(&"No document - nothing to run".into());
            return;
        };

        let settings = Settings::load();
        let content = SceneContent {
            paragraphs: count(&document, "#letterPaper .letter-paragraph"),
            lines: count(&document, "#screenMessage .message-line"),
            photos: count(&document, "#floatingPhotos .photo-frame"),
            decor: count(&document, "#screenConfirmation .decor-element"),
            corners: count(&document, "#screenConfirmation .confirmation-decor"),
        };
        log::info!("Scene content: {:?}", content);

        let viewport = platform::viewport();
        let seed = js_sys::Date::now() as u64;
        let music = MusicPlayer::from_document(&document);
        music.preload();

        let app = Rc::new(RefCell::new(App {
            flow: FlowController::new(settings, content, viewport, seed),
            petals: canvas(&document, "petalCanvas"),
            confetti: canvas(&document, "confettiCanvas"),
            document,
            music,
            bindings: HashMap::new(),
            frame: None,
        }));
        log::info!("Flow initialized with seed: {}", seed);

        {
            let mut a = app.borrow_mut();
            a.resize_canvases(viewport);
            a.measure_evade_button();
            a.flow.start(platform::now());
        }
        setup_resize(&app);
        pump(&app);

        platform::register_service_worker(SERVICE_WORKER_SCRIPT);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_app::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Petal Post (native) starting...");
    log::info!("The scenes run in the browser - use `trunk serve` for the web version");

    println!("\nRunning scripted walkthrough...");
    walkthrough();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Tap through every scene headlessly and check we end on the confirmation
#[cfg(not(target_arch = "wasm32"))]
fn walkthrough() {
    use petal_post::consts::FRAME_MS;
    use petal_post::sim::{FlowController, Scene, SceneContent, Tap, Target};
    use petal_post::{Settings, Viewport};

    let content = SceneContent::default();
    let mut flow = FlowController::new(Settings::load(), content, Viewport::default(), 42);
    let mut now = 0.0;
    flow.start(now);

    // (target, taps, settle before the first tap)
    let script = [
        (Target::HeartWrapper, 10, 0.0),
        (Target::Envelope, 1, 2000.0),
        (Target::LetterPaper, content.paragraphs + 1, 1500.0),
        (Target::MessageContainer, content.lines, 2000.0),
        (Target::EvadeButton, 3, 1800.0),
        (Target::AcceptButton, 1, 0.0),
    ];

    let mut effects = 0;
    for (target, taps, settle) in script {
        let until = now + settle;
        while now < until {
            now += FRAME_MS;
            flow.update(now);
        }
        for _ in 0..taps {
            now += 120.0;
            flow.update(now);
            flow.tap(Tap::touch(target, now));
        }
        effects += flow.drain_effects().len();
        println!("  {:?} x{} -> {:?}", target, taps, flow.phase());
    }
    for _ in 0..120 {
        now += FRAME_MS;
        flow.update(now);
    }
    effects += flow.drain_effects().len();

    assert_eq!(
        flow.active_scene(),
        Some(Scene::Confirmation),
        "walkthrough should end on the confirmation"
    );
    println!(
        "✓ Reached {:?} after {} transitions ({} effects)",
        Scene::Confirmation,
        flow.transitions(),
        effects
    );
}
