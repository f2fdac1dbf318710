//! Web UI
//!
//! Single page in vanilla HTML/CSS/JS. It drives the staged media endpoints
//! and shows pipeline progress from `/events`.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(root_page))
}

async fn root_page() -> impl IntoResponse {
    Html(ROOT_PAGE)
}

const ROOT_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>AI Video Transcriber</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 860px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
            color: #222;
        }
        h1 {
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        fieldset {
            border: 1px solid #ccc;
            border-radius: 6px;
            margin-bottom: 20px;
        }
        label {
            display: inline-block;
            min-width: 140px;
        }
        button {
            padding: 8px 18px;
            background: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
            cursor: pointer;
            margin: 6px 6px 6px 0;
        }
        button:disabled {
            background: #99b3cc;
            cursor: default;
        }
        button.danger {
            background: #b03030;
        }
        #progress-bar {
            width: 100%;
            height: 10px;
            background: #eee;
            border-radius: 5px;
            overflow: hidden;
        }
        #progress-fill {
            width: 0;
            height: 100%;
            background: #0066cc;
            transition: width 0.3s;
        }
        #transcript {
            white-space: pre-wrap;
            background: #f6f8fa;
            padding: 12px;
            border-radius: 4px;
            min-height: 60px;
        }
        .error {
            color: #b03030;
        }
    </style>
</head>
<body>
    <h1>AI Video Transcriber</h1>

    <fieldset>
        <legend>1. Upload video</legend>
        <input type="file" id="file" accept=".mp4,.mov,.avi,.mkv">
        <button id="upload">Upload</button>
        <div id="media-info"></div>
    </fieldset>

    <fieldset>
        <legend>2. Transcribe</legend>
        <div>
            <label for="language">Language</label>
            <select id="language">
                <option value="">Auto-detect</option>
                <option value="en">English</option>
                <option value="ak">Akan (Twi)</option>
                <option value="ee">Ewe</option>
                <option value="ha">Hausa</option>
                <option value="fr">French</option>
                <option value="es">Spanish</option>
                <option value="de">German</option>
                <option value="pt">Portuguese</option>
                <option value="sw">Swahili</option>
                <option value="yo">Yoruba</option>
            </select>
        </div>
        <div>
            <label for="task">Task</label>
            <select id="task">
                <option value="transcribe">Transcribe</option>
                <option value="translate">Translate to English</option>
            </select>
        </div>
        <button id="transcribe" disabled>Transcribe</button>
        <button id="mp3" disabled>Extract MP3</button>
    </fieldset>

    <fieldset>
        <legend>3. Burn captions</legend>
        <div><label for="font">Font</label>
            <select id="font">
                <option>Arial</option><option>Impact</option><option>Arial Black</option>
                <option>Verdana</option><option>Courier New</option>
            </select></div>
        <div><label for="font-size">Font size</label><input type="number" id="font-size" min="10" max="100" value="24"></div>
        <div><label for="text-color">Text colour</label><input type="color" id="text-color" value="#ffffff"></div>
        <div><label for="stroke-color">Outline colour</label><input type="color" id="stroke-color" value="#000000"></div>
        <div><label for="background">Background</label>
            <select id="background">
                <option value="none">None</option>
                <option value="drop_shadow">Drop shadow</option>
                <option value="box">Box</option>
            </select></div>
        <div><label for="scale">Output size</label>
            <select id="scale">
                <option value="720p">720p</option><option value="1080p">1080p</option>
                <option value="480p">480p</option><option value="original">Original</option>
            </select></div>
        <div><label for="watermark">Watermark</label><input type="text" id="watermark" maxlength="100"></div>
        <button id="captions" disabled>Burn captions</button>
    </fieldset>

    <div id="progress-bar"><div id="progress-fill"></div></div>
    <p id="status">Idle</p>
    <div id="downloads"></div>
    <div id="transcript"></div>

    <p><button class="danger" id="clear-cache">Clear server cache</button></p>

    <script>
        const $ = (id) => document.getElementById(id);
        let mediaId = null;
        let transcriptId = null;

        function setStatus(text, isError) {
            $('status').textContent = text;
            $('status').className = isError ? 'error' : '';
        }

        async function checked(response) {
            if (!response.ok) {
                let message = response.statusText;
                try {
                    const body = await response.json();
                    message = body.error.message;
                } catch (_) {}
                throw new Error(message);
            }
            return response;
        }

        function saveBlob(blob, filename) {
            const link = document.createElement('a');
            link.href = URL.createObjectURL(blob);
            link.download = filename;
            link.click();
            URL.revokeObjectURL(link.href);
        }

        const events = new EventSource('/events');
        ['PhaseStarted', 'JobCompleted', 'JobFailed'].forEach((type) => {
            events.addEventListener(type, (e) => {
                const event = JSON.parse(e.data);
                if (mediaId && event.media_id !== mediaId) return;
                if (type === 'PhaseStarted') {
                    $('progress-fill').style.width = event.progress_percent + '%';
                    setStatus(event.message);
                } else if (type === 'JobCompleted') {
                    $('progress-fill').style.width = '100%';
                }
            });
        });

        $('upload').addEventListener('click', async () => {
            const file = $('file').files[0];
            if (!file) { setStatus('Choose a video first', true); return; }
            const form = new FormData();
            form.append('file', file);
            setStatus('Uploading...');
            try {
                const response = await checked(await fetch('/api/media', { method: 'POST', body: form }));
                const media = await response.json();
                mediaId = media.media_id;
                $('media-info').textContent = media.filename + ' (' + (media.size_bytes / 1048576).toFixed(1) + ' MB)';
                ['transcribe', 'mp3', 'captions'].forEach((id) => $(id).disabled = false);
                setStatus('Uploaded');
            } catch (e) {
                setStatus(e.message, true);
            }
        });

        $('transcribe').addEventListener('click', async () => {
            const options = { task: $('task').value };
            if ($('language').value) options.language = $('language').value;
            setStatus('Transcribing...');
            try {
                const response = await checked(await fetch('/api/media/' + mediaId + '/transcript', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify(options),
                }));
                const transcript = await response.json();
                transcriptId = transcript.transcript_id;
                $('transcript').textContent = transcript.text || '(no speech detected)';
                $('downloads').innerHTML =
                    '<a href="' + transcript.srt_url + '">subtitles.srt</a> | ' +
                    '<a href="' + transcript.txt_url + '">transcript.txt</a>';
                setStatus(transcript.cached ? 'Done (from cache)' : 'Done');
            } catch (e) {
                setStatus(e.message, true);
            }
        });

        $('mp3').addEventListener('click', async () => {
            setStatus('Extracting MP3...');
            try {
                const response = await checked(await fetch('/api/media/' + mediaId + '/mp3', { method: 'POST' }));
                saveBlob(await response.blob(), 'audio_track.mp3');
                setStatus('MP3 ready');
            } catch (e) {
                setStatus(e.message, true);
            }
        });

        $('captions').addEventListener('click', async () => {
            const body = {
                style: {
                    font_family: $('font').value,
                    font_size: parseInt($('font-size').value, 10),
                    text_color: $('text-color').value,
                    stroke_color: $('stroke-color').value,
                    background: $('background').value,
                    scale: $('scale').value,
                    watermark_text: $('watermark').value,
                },
                options: { task: $('task').value },
            };
            if (transcriptId) body.transcript_id = transcriptId;
            if ($('language').value) body.options.language = $('language').value;
            setStatus('Burning captions...');
            try {
                const response = await checked(await fetch('/api/media/' + mediaId + '/captions', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify(body),
                }));
                saveBlob(await response.blob(), 'captioned.mp4');
                setStatus('Captioned video ready');
            } catch (e) {
                setStatus(e.message, true);
            }
        });

        $('clear-cache').addEventListener('click', async () => {
            try {
                const response = await checked(await fetch('/api/cache', { method: 'DELETE' }));
                const result = await response.json();
                mediaId = null;
                transcriptId = null;
                ['transcribe', 'mp3', 'captions'].forEach((id) => $(id).disabled = true);
                $('media-info').textContent = '';
                $('downloads').innerHTML = '';
                $('transcript').textContent = '';
                setStatus('Cache cleared (' + result.removed_entries + ' entries)');
            } catch (e) {
                setStatus(e.message, true);
            }
        });
    </script>
</body>
</html>
"##;
